//! 研究会话：一次端到端请求的生命周期
//!
//! 由调用方显式创建并交给 ResearchLoop；会话持有取消令牌与本次请求的 Context Store。
//! 循环按值消费 Session，返回最终答案时 Context Store 随之释放，不做任何持久化。
//! 调用方标识到 Session 的映射由外层传输层负责，这里没有全局注册表。

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::research::ContextStore;

/// 单次研究会话
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    /// 调用方断开等外部取消信号
    cancel_token: CancellationToken,
    store: ContextStore,
}

impl Session {
    pub fn new() -> Self {
        Self::with_cancel_token(CancellationToken::new())
    }

    /// 使用外部令牌（例如连接级令牌的 child_token）创建会话
    pub fn with_cancel_token(cancel_token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            cancel_token,
            store: ContextStore::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// 唯一的可变入口，仅供 Ingesting 阶段使用
    pub(crate) fn store_mut(&mut self) -> &mut ContextStore {
        &mut self.store
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
