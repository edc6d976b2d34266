//! Persona bot - runs generate → publish cycles and owns the publisher session

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::{
    model::{BotState, CycleStats, PostHistory},
    ports::{Clock, CompletionService, PublishError, PublishResult, Publisher},
    usecases::{
        compose::PostComposer,
        schedule::{CadenceScheduler, CycleRunner},
    },
};

/// Fatal bot errors
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Failed to connect to {platform}: {source}")]
    Connect {
        platform: &'static str,
        #[source]
        source: PublishError,
    },
    #[error("Bot has been stopped")]
    Stopped,
}

enum CycleFailure {
    Generation,
    Publish(PublishError),
}

/// Bot orchestrator
pub struct PersonaBot<C, P, Cl>
where
    C: CompletionService + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    composer: PostComposer<C, Cl>,
    publisher: Arc<P>,
    state: BotState,
    stats: CycleStats,
}

impl<C, P, Cl> PersonaBot<C, P, Cl>
where
    C: CompletionService + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(composer: PostComposer<C, Cl>, publisher: Arc<P>) -> Self {
        Self {
            composer,
            publisher,
            state: BotState::Uninitialized,
            stats: CycleStats::default(),
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn history(&self) -> &PostHistory {
        self.composer.history()
    }

    /// Connect the publisher. Failure is fatal and leaves the bot stopped.
    pub async fn initialize(&mut self) -> Result<(), BotError> {
        match self.state {
            BotState::Uninitialized => {}
            BotState::Stopped => return Err(BotError::Stopped),
            BotState::Connected | BotState::Running => return Ok(()),
        }

        let persona = self.composer.persona();
        tracing::info!(
            platform = self.publisher.platform(),
            persona = %persona.system_prompt,
            model = %persona.model,
            "Initializing persona bot"
        );

        if let Err(source) = self.publisher.connect().await {
            tracing::error!(error = %source, "Failed to connect publisher");
            self.state = BotState::Stopped;
            return Err(BotError::Connect {
                platform: self.publisher.platform(),
                source,
            });
        }

        if !self.publisher.verify_credentials().await {
            tracing::warn!(
                platform = self.publisher.platform(),
                "Credential check failed, publishing may be rejected"
            );
        }

        self.state = BotState::Connected;
        Ok(())
    }

    /// Run one generate → publish cycle. Never fails; returns whether a post went out.
    pub async fn run_cycle(&mut self) -> bool {
        self.stats.attempted += 1;

        let outcome = AssertUnwindSafe(self.attempt_cycle()).catch_unwind().await;

        match outcome {
            Ok(Ok(result)) => {
                self.stats.published += 1;
                tracing::info!(
                    post_id = %result.id,
                    url = ?result.url,
                    "Published post"
                );
                true
            }
            Ok(Err(CycleFailure::Generation)) => {
                self.stats.generation_failures += 1;
                tracing::error!("Failed to generate post content");
                false
            }
            Ok(Err(CycleFailure::Publish(e))) => {
                self.stats.publish_failures += 1;
                tracing::error!(
                    platform = self.publisher.platform(),
                    error = %e,
                    "Failed to publish post"
                );
                false
            }
            Err(panic) => {
                self.stats.panics += 1;
                tracing::error!(error = %panic_message(&*panic), "Cycle panicked");
                false
            }
        }
    }

    async fn attempt_cycle(&mut self) -> Result<PublishResult, CycleFailure> {
        let post = self
            .composer
            .generate()
            .await
            .ok_or(CycleFailure::Generation)?;

        tracing::info!(chars = post.chars().count(), post = %post, "Publishing post");

        self.publisher
            .publish(&post)
            .await
            .map_err(CycleFailure::Publish)
    }

    /// Connect, post once immediately, then post on the scheduler's cadence until shutdown
    pub async fn run(
        &mut self,
        scheduler: &CadenceScheduler,
        shutdown: &CancellationToken,
    ) -> Result<(), BotError> {
        self.initialize().await?;
        self.state = BotState::Running;

        if !shutdown.is_cancelled() {
            self.run_cycle().await;
            scheduler.run(self, shutdown).await;
        }

        self.stop();
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == BotState::Stopped {
            return;
        }
        self.state = BotState::Stopped;
        tracing::info!(
            attempted = self.stats.attempted,
            published = self.stats.published,
            generation_failures = self.stats.generation_failures,
            publish_failures = self.stats.publish_failures,
            panics = self.stats.panics,
            "Persona bot stopped"
        );
    }
}

#[async_trait]
impl<C, P, Cl> CycleRunner for PersonaBot<C, P, Cl>
where
    C: CompletionService + ?Sized,
    P: Publisher + ?Sized,
    Cl: Clock + ?Sized,
{
    async fn run_cycle(&mut self) -> bool {
        PersonaBot::run_cycle(self).await
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionParams, ConversationRequest, PersonaConfig};
    use crate::ports::CompletionError;
    use crate::usecases::schedule::ScheduleConfig;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use time::OffsetDateTime;

    enum Reply {
        Text(&'static str),
        Fail,
        Panic,
    }

    struct FakeCompleter {
        reply: Reply,
    }

    #[async_trait]
    impl CompletionService for FakeCompleter {
        async fn complete(
            &self,
            _conversation: &ConversationRequest,
            _params: &CompletionParams,
        ) -> Result<String, CompletionError> {
            match self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => Err(CompletionError::Exhausted {
                    attempts: 3,
                    last: Box::new(CompletionError::Api("boom".to_string())),
                }),
                Reply::Panic => panic!("completion exploded"),
            }
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        fail_connect: bool,
        fail_publish: bool,
        connected: AtomicBool,
        published: Mutex<Vec<String>>,
        connect_calls: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn connect(&self) -> Result<(), PublishError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(PublishError::Auth("bad credentials".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn publish(&self, text: &str) -> Result<PublishResult, PublishError> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(PublishError::NotConnected);
            }
            if self.fail_publish {
                return Err(PublishError::Api("API Error".to_string()));
            }
            let mut published = self.published.lock().unwrap();
            published.push(text.to_string());
            Ok(PublishResult {
                id: format!("{}", published.len()),
                url: None,
            })
        }

        async fn verify_credentials(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn platform(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeClock;

    impl Clock for FakeClock {
        fn now(&self) -> OffsetDateTime {
            OffsetDateTime::UNIX_EPOCH
        }
    }

    fn bot(
        reply: Reply,
        publisher: FakePublisher,
    ) -> (
        PersonaBot<FakeCompleter, FakePublisher, FakeClock>,
        Arc<FakePublisher>,
    ) {
        let composer = PostComposer::new(
            Arc::new(FakeCompleter { reply }),
            Arc::new(FakeClock),
            PersonaConfig::new("Test bot persona", "gpt-3.5-turbo"),
        );
        let publisher = Arc::new(publisher);
        (PersonaBot::new(composer, Arc::clone(&publisher)), publisher)
    }

    #[tokio::test]
    async fn test_successful_cycle() {
        let (mut bot, publisher) = bot(Reply::Text("Test post content"), FakePublisher::default());
        bot.initialize().await.unwrap();

        assert_eq!(bot.state(), BotState::Connected);
        assert!(bot.run_cycle().await);
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec!["Test post content".to_string()]
        );
        assert_eq!(bot.stats().published, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_skips_publish() {
        let (mut bot, publisher) = bot(Reply::Fail, FakePublisher::default());
        bot.initialize().await.unwrap();

        assert!(!bot.run_cycle().await);
        assert!(publisher.published.lock().unwrap().is_empty());
        assert_eq!(bot.stats().generation_failures, 1);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_history() {
        let (mut bot, _) = bot(
            Reply::Text("Generated anyway"),
            FakePublisher {
                fail_publish: true,
                ..Default::default()
            },
        );
        bot.initialize().await.unwrap();

        assert!(!bot.run_cycle().await);
        assert_eq!(bot.history().iter().collect::<Vec<_>>(), vec!["Generated anyway"]);
        assert_eq!(bot.stats().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_publish_before_connect_is_reported_not_raised() {
        let (mut bot, publisher) = bot(Reply::Text("Too early"), FakePublisher::default());

        assert!(!bot.run_cycle().await);
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_collaborator_is_contained() {
        let (mut bot, _) = bot(Reply::Panic, FakePublisher::default());
        bot.initialize().await.unwrap();

        assert!(!bot.run_cycle().await);
        assert_eq!(bot.stats().panics, 1);
        assert!(bot.history().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal() {
        let (mut bot, _) = bot(
            Reply::Text("unused"),
            FakePublisher {
                fail_connect: true,
                ..Default::default()
            },
        );

        let result = bot.initialize().await;

        assert!(matches!(result, Err(BotError::Connect { .. })));
        assert_eq!(bot.state(), BotState::Stopped);
        assert!(matches!(bot.initialize().await, Err(BotError::Stopped)));
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (mut bot, publisher) = bot(Reply::Text("post"), FakePublisher::default());

        bot.initialize().await.unwrap();
        bot.initialize().await.unwrap();

        assert_eq!(publisher.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_posts_immediately_then_on_cadence() {
        let (mut bot, publisher) = bot(Reply::Text("scheduled"), FakePublisher::default());
        let scheduler = CadenceScheduler::new(ScheduleConfig::default());
        let shutdown = CancellationToken::new();

        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2 * 3600 + 30)).await;
                shutdown.cancel();
            })
        };

        bot.run(&scheduler, &shutdown).await.unwrap();
        canceller.await.unwrap();

        // one immediate post plus one per elapsed hour
        assert_eq!(publisher.published.lock().unwrap().len(), 3);
        assert_eq!(bot.state(), BotState::Stopped);
        assert_eq!(bot.stats().attempted, 3);
    }

    #[tokio::test]
    async fn test_run_with_failed_connect_posts_nothing() {
        let (mut bot, publisher) = bot(
            Reply::Text("never"),
            FakePublisher {
                fail_connect: true,
                ..Default::default()
            },
        );
        let scheduler = CadenceScheduler::new(ScheduleConfig::default());

        let result = bot.run(&scheduler, &CancellationToken::new()).await;

        assert!(result.is_err());
        assert!(publisher.published.lock().unwrap().is_empty());
    }
}
