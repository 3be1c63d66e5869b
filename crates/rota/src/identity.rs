//! Identity context: who the current operator is, if anyone.
//!
//! Session and role resolution live elsewhere; this only carries the
//! resolved operator id and lets controllers watch it change.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use rota_api::OperatorId;

#[derive(Debug, Clone)]
pub struct IdentityContext {
    operator: Arc<watch::Sender<Option<OperatorId>>>,
}

impl Default for IdentityContext {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentityContext {
    pub fn new(operator: Option<OperatorId>) -> Self {
        let (operator, _) = watch::channel(operator);
        Self {
            operator: Arc::new(operator),
        }
    }

    /// Replace the current identity. Watchers are only woken on an actual change.
    pub fn set(&self, next: Option<OperatorId>) {
        let changed = self.operator.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            info!("[IdentityContext] operator is now {:?}", next);
        }
    }

    pub fn sign_in(&self, operator: OperatorId) {
        self.set(Some(operator));
    }

    pub fn sign_out(&self) {
        self.set(None);
    }

    pub fn current(&self) -> Option<OperatorId> {
        self.operator.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<OperatorId>> {
        self.operator.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watchers_see_changes_only() {
        let identity = IdentityContext::default();
        let mut rx = identity.subscribe();

        identity.sign_out();
        assert!(!rx.has_changed().unwrap());

        identity.sign_in(OperatorId::from("op-1"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(OperatorId::from("op-1")));

        identity.sign_in(OperatorId::from("op-1"));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(identity.current(), Some(OperatorId::from("op-1")));
    }
}
