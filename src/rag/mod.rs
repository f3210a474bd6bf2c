// Question answering pipeline
// Condense the follow-up, retrieve passages, answer, then record the exchange


pub mod answer;
pub mod condenser;
pub mod retriever;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::Result;
use crate::config::Config;
use crate::history::{Exchange, HistoryStore};
use crate::index::ScoredPassage;
use crate::indexer::SharedIndex;
use crate::llm::LanguageModel;
use crate::transport::Transport;

pub use answer::{AnswerAssembler, EmptyContextPolicy, format_context};
pub use condenser::{QueryCondenser, format_chat_history};
pub use retriever::{RetrievalConfig, ThresholdRetriever};

/// Everything one successful pipeline run produced
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub answer: String,
    pub standalone_question: String,
    pub passages: Vec<ScoredPassage>,
}

/// Reply sent in place of an answer when the pipeline fails
#[inline]
pub fn apology(error: &crate::DocsError) -> String {
    format!(
        "An error occurred, please contact the administrator. ({})",
        error
    )
}

pub struct Assistant {
    index: Arc<SharedIndex>,
    history: Arc<dyn HistoryStore>,
    condenser: QueryCondenser,
    retriever: ThresholdRetriever,
    assembler: AnswerAssembler,
    requester_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for Assistant {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("index", &self.index)
            .field("retriever", &self.retriever)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    #[inline]
    pub fn new(
        index: Arc<SharedIndex>,
        history: Arc<dyn HistoryStore>,
        condenser: QueryCondenser,
        retriever: ThresholdRetriever,
        assembler: AnswerAssembler,
    ) -> Self {
        Self {
            index,
            history,
            condenser,
            retriever,
            assembler,
            requester_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire the pipeline stages from configuration around one language model
    #[inline]
    pub fn from_config(
        config: &Config,
        index: Arc<SharedIndex>,
        history: Arc<dyn HistoryStore>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::new(
            index,
            history,
            QueryCondenser::new(Arc::clone(&model)),
            ThresholdRetriever::new(config.retrieval.clone()),
            AnswerAssembler::new(model, &config.assistant),
        )
    }

    #[inline]
    pub fn shared_index(&self) -> &SharedIndex {
        &self.index
    }

    async fn requester_lock(&self, requester: &str) -> Arc<Mutex<()>> {
        let mut locks = self.requester_locks.lock().await;
        Arc::clone(locks.entry(requester.to_string()).or_default())
    }

    /// Forget the requester's lock once no other question holds or awaits it
    async fn release_requester_lock(&self, requester: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        // Clones are only taken under the map lock, so the count cannot grow here
        let mut locks = self.requester_locks.lock().await;
        if locks
            .get(requester)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(requester);
        }
    }

    #[cfg(test)]
    async fn tracked_requesters(&self) -> usize {
        self.requester_locks.lock().await.len()
    }

    async fn answer_locked(&self, requester: &str, question: &str) -> Result<AnswerOutcome> {
        let history = self.history.load(requester).await?;
        let index = self.index.get().await?;

        let standalone_question = self.condenser.condense(question, &history).await?;
        let passages = self
            .retriever
            .retrieve(&*index, &standalone_question)
            .await?;
        let answer = self.assembler.answer(&standalone_question, &passages).await?;

        self.history
            .append(requester, Exchange::new(question, answer.as_str()))
            .await?;

        Ok(AnswerOutcome {
            answer,
            standalone_question,
            passages,
        })
    }

    /// Answer a question, replying with an apology on failure
    ///
    /// The exchange is only recorded when an answer was produced.
    #[inline]
    pub async fn handle_question(&self, requester: &str, question: &str) -> String {
        match self.try_handle_question(requester, question).await {
            Ok(outcome) => outcome.answer,
            Err(e) => {
                error!("Failed to answer question from {}: {}", requester, e);
                apology(&e)
            }
        }
    }

    #[inline]
    pub async fn try_handle_question(
        &self,
        requester: &str,
        question: &str,
    ) -> Result<AnswerOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("question", %request_id, requester);

        async move {
            let start = Instant::now();
            let lock = self.requester_lock(requester).await;
            let result = {
                let _guard = lock.lock().await;
                self.answer_locked(requester, question).await
            };
            self.release_requester_lock(requester, lock).await;

            if let Ok(outcome) = &result {
                info!(
                    "Answered with {} passages in {:?}",
                    outcome.passages.len(),
                    start.elapsed()
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Answer every message from `transport` until it closes
    ///
    /// Returns the number of messages handled.
    #[inline]
    pub async fn serve<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<usize> {
        let mut handled = 0;
        while let Some(message) = transport.next_message().await? {
            let reply = self
                .handle_question(&message.requester_id, &message.text)
                .await;
            transport.reply(&message, &reply).await?;
            handled += 1;
        }

        info!("Transport closed after {} messages", handled);
        Ok(handled)
    }
}
