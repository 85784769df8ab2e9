//! 题目生成上下文
//!
//! 封装"我正在生成哪个请求的哪道题"这一信息，只用于日志前缀

use std::fmt::Display;

use crate::models::request::{ItemNo, Request, RequestId};

#[derive(Debug, Clone)]
pub struct ItemCtx {
    pub request_id: RequestId,
    pub item_no: ItemNo,
    /// 所属套题
    pub set_id: Option<String>,
    /// 第几轮生成（重新生成时递增）
    pub generation: u32,
}

impl ItemCtx {
    pub fn new(request_id: RequestId, item_no: ItemNo) -> Self {
        Self {
            request_id,
            item_no,
            set_id: None,
            generation: 0,
        }
    }

    pub fn from_request(request: &Request) -> Self {
        Self {
            request_id: request.id.clone(),
            item_no: request.item_no,
            set_id: request.set_id.clone(),
            generation: request.generation,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.set_id {
            Some(set_id) => write!(
                f,
                "[套题 {} 请求 {} #{}]",
                set_id, self.request_id, self.item_no
            ),
            None => write!(f, "[请求 {} #{}]", self.request_id, self.item_no),
        }
    }
}
