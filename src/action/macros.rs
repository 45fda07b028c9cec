//! Sequential execution of `__MULTI_` macros.
//!
//! Steps run strictly in order inside one spawned task. A failing step is
//! logged and the macro continues; effects already issued are never rolled
//! back. Cancellation (device disconnect, shutdown) abandons the remaining
//! steps, checked between steps and inside delays.

use super::ActionContext;
use crate::command::Command;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroOutcome {
    Completed,
    Cancelled,
}

pub struct MacroExecution {
    steps: Vec<String>,
}

impl MacroExecution {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub async fn run(self, ctx: &ActionContext) -> MacroOutcome {
        for (index, step) in self.steps.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                debug!("macro cancelled before step {index}");
                return MacroOutcome::Cancelled;
            }

            match Command::parse(step) {
                // One level only; a macro inside a macro is a config bug.
                Command::Multi(_) => {
                    warn!("skipping nested macro at step {index}");
                }
                Command::Delay(ms) => {
                    tokio::select! {
                        () = ctx.cancel.cancelled() => {
                            debug!("macro cancelled during delay at step {index}");
                            return MacroOutcome::Cancelled;
                        }
                        () = tokio::time::sleep(Duration::from_millis(ms)) => {}
                    }
                }
                command => {
                    if let Err(e) = ctx.execute_single(command).await {
                        warn!("macro step {index} ('{step}') failed: {e}");
                    }
                }
            }
        }
        MacroOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeckEvent;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn test_ctx() -> (ActionContext, tokio::sync::broadcast::Receiver<DeckEvent>) {
        ActionContext::detached()
    }

    #[tokio::test(start_paused = true)]
    async fn delay_steps_wait_the_requested_time() {
        let (ctx, _rx) = test_ctx();
        let steps = vec!["__DELAY_200__".to_string(), "__NEXT_PAGE__".to_string()];
        let start = Instant::now();
        let outcome = MacroExecution::new(steps).run(&ctx).await;
        assert_eq!(outcome, MacroOutcome::Completed);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn nested_macros_are_skipped_not_run() {
        let (ctx, mut rx) = test_ctx();
        let steps = vec![
            "__MULTI___NEXT_PAGE__;;__NEXT_PAGE__".to_string(),
            "__NEXT_PAGE__".to_string(),
        ];
        let outcome = MacroExecution::new(steps).run(&ctx).await;
        assert_eq!(outcome, MacroOutcome::Completed);
        // Only the top-level navigation step fired.
        assert!(matches!(rx.try_recv(), Ok(DeckEvent::NextPage)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancellation_abandons_remaining_steps() {
        let (mut ctx, mut rx) = test_ctx();
        let cancel = CancellationToken::new();
        cancel.cancel();
        ctx.cancel = cancel;

        let steps = vec!["__NEXT_PAGE__".to_string()];
        let outcome = MacroExecution::new(steps).run(&ctx).await;
        assert_eq!(outcome, MacroOutcome::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_delay_stops_the_macro() {
        let (mut ctx, mut rx) = test_ctx();
        let cancel = CancellationToken::new();
        ctx.cancel = cancel.clone();

        let steps = vec!["__DELAY_60000__".to_string(), "__NEXT_PAGE__".to_string()];
        let run = tokio::spawn(async move { MacroExecution::new(steps).run(&ctx).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert_eq!(run.await.unwrap(), MacroOutcome::Cancelled);
        assert!(rx.try_recv().is_err());
    }
}
