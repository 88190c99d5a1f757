//! Poll scheduler — one owning task per linked account.
//!
//! Each task drives its account through Idle → Polling → (Idle |
//! Backoff). Successful cycles repoll on the fixed interval; an
//! account-wide failure doubles the delay up to a cap. One account's
//! failures never touch another account's schedule, and because each
//! account is owned by exactly one task, no account is ever polled
//! twice concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::MailPipeline;
use crate::registry::Account;

/// Where an account currently is in its poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Waiting for the next interval tick.
    Idle,
    /// A cycle is in flight.
    Polling,
    /// Waiting out an error delay.
    Backoff,
}

/// Outcome of the most recent completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastCycle {
    Success { delivered: usize },
    Failure(String),
}

/// Snapshot of one account's scheduling state, for `/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPollStatus {
    pub state: AccountState,
    pub consecutive_failures: u32,
    pub last_cycle: Option<LastCycle>,
}

impl Default for AccountPollStatus {
    fn default() -> Self {
        Self {
            state: AccountState::Idle,
            consecutive_failures: 0,
            last_cycle: None,
        }
    }
}

/// Computes the backoff delay after `failures` consecutive failures.
fn backoff_delay(failures: u32, base_secs: u64, max_secs: u64) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    let secs = base_secs.saturating_mul(1u64 << exponent).min(max_secs);
    Duration::from_secs(secs)
}

struct SchedulerShared {
    statuses: RwLock<HashMap<String, AccountPollStatus>>,
    triggers: RwLock<HashMap<String, Arc<Notify>>>,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
}

/// Drives poll cycles for every linked account.
#[derive(Clone)]
pub struct PollScheduler {
    pipeline: MailPipeline,
    poll_interval: Duration,
    backoff_base_secs: u64,
    backoff_max_secs: u64,
    shared: Arc<SchedulerShared>,
}

impl PollScheduler {
    pub fn new(
        pipeline: MailPipeline,
        poll_interval_secs: u64,
        backoff_base_secs: u64,
        backoff_max_secs: u64,
    ) -> Self {
        Self {
            pipeline,
            poll_interval: Duration::from_secs(poll_interval_secs),
            backoff_base_secs,
            backoff_max_secs,
            shared: Arc::new(SchedulerShared {
                statuses: RwLock::new(HashMap::new()),
                triggers: RwLock::new(HashMap::new()),
                shutdown: AtomicBool::new(false),
                shutdown_notify: Notify::new(),
            }),
        }
    }

    /// Spawns the owning poll task for one account.
    pub async fn spawn_account(&self, account: Account) -> JoinHandle<()> {
        let key = account.key();
        let trigger = Arc::new(Notify::new());

        {
            let mut statuses = self.shared.statuses.write().await;
            statuses.insert(key.clone(), AccountPollStatus::default());
        }
        {
            let mut triggers = self.shared.triggers.write().await;
            triggers.insert(key.clone(), trigger.clone());
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_account_loop(account, trigger).await;
        })
    }

    /// Spawns poll tasks for every account in the list.
    pub async fn spawn_all(&self, accounts: Vec<Account>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(accounts.len());
        for account in accounts {
            handles.push(self.spawn_account(account).await);
        }
        handles
    }

    /// Wakes an account's task to poll now instead of waiting out its
    /// current delay. Returns false if the account has no task.
    pub async fn trigger_poll(&self, account_key: &str) -> bool {
        let triggers = self.shared.triggers.read().await;
        match triggers.get(account_key) {
            Some(trigger) => {
                trigger.notify_one();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every account's scheduling state.
    pub async fn status(&self) -> HashMap<String, AccountPollStatus> {
        self.shared.statuses.read().await.clone()
    }

    /// Requests shutdown. In-flight cycles finish their current message.
    pub fn shutdown(&self) {
        self.pipeline.request_shutdown();
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.shutdown_notify.notify_waiters();
    }

    fn shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    async fn set_status<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut AccountPollStatus),
    {
        let mut statuses = self.shared.statuses.write().await;
        f(statuses.entry(key.to_string()).or_default());
    }

    async fn run_account_loop(&self, account: Account, trigger: Arc<Notify>) {
        let key = account.key();
        info!(account = %key, "Poll task started");

        // First poll happens immediately on startup.
        let mut delay = Duration::ZERO;
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = trigger.notified() => {}
                _ = self.shared.shutdown_notify.notified() => {}
            }
            if self.shutdown_requested() {
                break;
            }

            self.set_status(&key, |s| s.state = AccountState::Polling)
                .await;

            match self.pipeline.run_cycle(&account).await {
                Ok(report) => {
                    failures = 0;
                    delay = self.poll_interval;
                    self.set_status(&key, |s| {
                        s.state = AccountState::Idle;
                        s.consecutive_failures = 0;
                        s.last_cycle = Some(LastCycle::Success {
                            delivered: report.delivered,
                        });
                    })
                    .await;
                }
                Err(e) => {
                    failures += 1;
                    delay = backoff_delay(failures, self.backoff_base_secs, self.backoff_max_secs);
                    error!(
                        account = %key,
                        consecutive_failures = failures,
                        backoff_secs = delay.as_secs(),
                        error = %e,
                        "Poll cycle failed"
                    );
                    self.set_status(&key, |s| {
                        s.state = AccountState::Backoff;
                        s.consecutive_failures = failures;
                        s.last_cycle = Some(LastCycle::Failure(e.to_string()));
                    })
                    .await;
                }
            }

            if self.shutdown_requested() {
                break;
            }
        }

        info!(account = %key, "Poll task stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::db::Database;
    use crate::delivery::{DeliveryError, DeliverySink};
    use crate::ledger::DedupLedger;
    use crate::mail::{MailError, MailFetcher, UnreadMessage};
    use crate::summarizer::{Summarizer, SummarizerError, Summary};

    use super::*;

    #[derive(Default)]
    struct StubFetcher {
        list_fails: Mutex<bool>,
        /// Listing fails for this mailbox only.
        failing_mailbox: Mutex<Option<String>>,
    }

    #[async_trait]
    impl MailFetcher for StubFetcher {
        async fn list_unread_ids(
            &self,
            account: &Account,
            _max_results: u32,
        ) -> Result<Vec<String>, MailError> {
            if *self.list_fails.lock().unwrap() {
                return Err(MailError::Transient("down".to_string()));
            }
            if self.failing_mailbox.lock().unwrap().as_deref() == Some(account.mailbox.as_str()) {
                return Err(MailError::Transient("mailbox down".to_string()));
            }
            Ok(Vec::new())
        }

        async fn fetch_message(
            &self,
            _account: &Account,
            message_id: &str,
        ) -> Result<UnreadMessage, MailError> {
            Err(MailError::MessageGone(message_id.to_string()))
        }

        async fn mark_read(&self, _account: &Account, _message_id: &str) -> Result<(), MailError> {
            Ok(())
        }
    }

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(
            &self,
            _sender: &str,
            _subject: &str,
            _body: &str,
        ) -> Result<String, SummarizerError> {
            Ok("summary".to_string())
        }
    }

    struct StubSink;

    #[async_trait]
    impl DeliverySink for StubSink {
        async fn deliver(
            &self,
            _chat_id: i64,
            _summary: &Summary,
            _protect: bool,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn test_account() -> Account {
        Account {
            chat_id: 1,
            mailbox: "a@gmail.com".to_string(),
            privacy: false,
            label: None,
            linked_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_scheduler(fetcher: Arc<dyn MailFetcher>) -> PollScheduler {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let pipeline = MailPipeline::new(
            fetcher,
            Arc::new(StubSummarizer),
            Arc::new(StubSink),
            DedupLedger::new(db.clone()),
            db,
            1,
            10,
            Arc::new(AtomicBool::new(false)),
        );
        PollScheduler::new(pipeline, 3600, 30, 900)
    }

    #[tokio::test]
    async fn test_successful_cycle_reports_idle_status() {
        let fetcher = Arc::new(StubFetcher::default());
        let scheduler = test_scheduler(fetcher);
        let account = test_account();
        let key = account.key();

        let handle = scheduler.spawn_account(account).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = scheduler.status().await;
        let entry = status.get(&key).expect("account should have a status");
        assert_eq!(entry.state, AccountState::Idle);
        assert_eq!(entry.consecutive_failures, 0);
        assert!(matches!(
            entry.last_cycle,
            Some(LastCycle::Success { delivered: 0 })
        ));

        scheduler.shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_failed_cycle_enters_backoff() {
        let fetcher = Arc::new(StubFetcher {
            list_fails: Mutex::new(true),
            ..Default::default()
        });
        let scheduler = test_scheduler(fetcher);
        let account = test_account();
        let key = account.key();

        let handle = scheduler.spawn_account(account).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = scheduler.status().await;
        let entry = status.get(&key).expect("account should have a status");
        assert_eq!(entry.state, AccountState::Backoff);
        assert_eq!(entry.consecutive_failures, 1);
        assert!(matches!(entry.last_cycle, Some(LastCycle::Failure(_))));

        scheduler.shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_trigger_poll_unknown_account() {
        let scheduler = test_scheduler(Arc::new(StubFetcher::default()));
        assert!(!scheduler.trigger_poll("1:nobody@gmail.com").await);
    }

    /// Fetcher whose list call dwells long enough for poll triggers to
    /// pile up, while counting how many cycles run at once.
    #[derive(Default)]
    struct SlowFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        cycles: AtomicUsize,
    }

    #[async_trait]
    impl MailFetcher for SlowFetcher {
        async fn list_unread_ids(
            &self,
            _account: &Account,
            _max_results: u32,
        ) -> Result<Vec<String>, MailError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.cycles.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn fetch_message(
            &self,
            _account: &Account,
            message_id: &str,
        ) -> Result<UnreadMessage, MailError> {
            Err(MailError::MessageGone(message_id.to_string()))
        }

        async fn mark_read(&self, _account: &Account, _message_id: &str) -> Result<(), MailError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cycles_for_one_account_never_overlap() {
        let fetcher = Arc::new(SlowFetcher::default());
        let scheduler = test_scheduler(fetcher.clone());
        let account = test_account();
        let key = account.key();

        let handle = scheduler.spawn_account(account).await;

        // Fire triggers faster than cycles complete.
        for _ in 0..10 {
            scheduler.trigger_poll(&key).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(fetcher.cycles.load(Ordering::SeqCst) >= 2);
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_failing_account_does_not_affect_others() {
        let fetcher = Arc::new(StubFetcher {
            failing_mailbox: Mutex::new(Some("b@gmail.com".to_string())),
            ..Default::default()
        });
        let scheduler = test_scheduler(fetcher);

        let healthy = test_account();
        let broken = Account {
            chat_id: 2,
            mailbox: "b@gmail.com".to_string(),
            ..test_account()
        };
        let healthy_key = healthy.key();
        let broken_key = broken.key();

        let handles = scheduler.spawn_all(vec![healthy, broken]).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = scheduler.status().await;
        assert_eq!(status[&healthy_key].state, AccountState::Idle);
        assert_eq!(status[&healthy_key].consecutive_failures, 0);
        assert_eq!(status[&broken_key].state, AccountState::Backoff);
        assert!(status[&broken_key].consecutive_failures >= 1);

        scheduler.shutdown();
        for handle in handles {
            let _ = handle.await;
        }
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        assert_eq!(backoff_delay(1, 30, 900), Duration::from_secs(30));
        assert_eq!(backoff_delay(2, 30, 900), Duration::from_secs(60));
        assert_eq!(backoff_delay(3, 30, 900), Duration::from_secs(120));
        assert_eq!(backoff_delay(5, 30, 900), Duration::from_secs(480));
        assert_eq!(backoff_delay(6, 30, 900), Duration::from_secs(900));
        assert_eq!(backoff_delay(100, 30, 900), Duration::from_secs(900));
    }

    #[test]
    fn test_backoff_zero_failures() {
        assert_eq!(backoff_delay(0, 30, 900), Duration::from_secs(30));
    }
}
