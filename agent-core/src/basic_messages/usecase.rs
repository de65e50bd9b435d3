use rst_common::standard::async_trait::async_trait;
use rst_common::with_logging::log::debug;

use crate::agent::{InboundMessageContext, MessageSender};
use crate::connections::{ConnectionAPI, ConnectionUsecase};
use crate::events::{AgentEvent, EventBus};
use crate::messaging::AgentMessage;
use crate::storage::{Query, Repository, StorageBuilder};

use super::messages::BasicMessage;
use super::record::BasicMessageRecord;
use super::types::{BasicMessageAPI, BasicMessageError, BasicMessageRole};

#[derive(Clone)]
pub struct Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    repo: Repository<TStorage, BasicMessageRecord>,
    connections: ConnectionUsecase<TStorage>,
    sender: MessageSender,
    events: EventBus,
}

impl<TStorage> Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    pub fn new(
        storage: TStorage,
        connections: ConnectionUsecase<TStorage>,
        sender: MessageSender,
        events: EventBus,
    ) -> Self {
        Self {
            repo: Repository::new(storage),
            connections,
            sender,
            events,
        }
    }

    async fn store(
        &self,
        record: BasicMessageRecord,
        message: BasicMessage,
    ) -> Result<BasicMessageRecord, BasicMessageError> {
        let saved = self.repo.save(&record).await?;
        debug!(
            "basic message {}: stored as {} on connection {}",
            saved.id, saved.role, saved.connection_id
        );

        self.events.publish(AgentEvent::BasicMessageStateChanged {
            record: saved.clone(),
            message,
        });
        Ok(saved)
    }
}

#[async_trait]
impl<TStorage> BasicMessageAPI for Usecase<TStorage>
where
    TStorage: StorageBuilder,
{
    async fn send_message(
        &self,
        connection_id: String,
        content: String,
    ) -> Result<BasicMessageRecord, BasicMessageError> {
        let connection = self.connections.get_by_id(connection_id).await?;
        if !connection.is_ready() {
            return Err(BasicMessageError::ValidationError(format!(
                "connection {} is not ready",
                connection.id
            )));
        }

        let message = BasicMessage::new(content);
        let payload = AgentMessage::new(&message)?;

        let record = BasicMessageRecord::new(
            connection.id.to_owned(),
            BasicMessageRole::Sender,
            &message,
        );
        let saved = self.store(record, message).await?;

        self.sender.send_message(payload, &connection).await?;
        Ok(saved)
    }

    async fn process_message(
        &self,
        ctx: &InboundMessageContext,
    ) -> Result<BasicMessageRecord, BasicMessageError> {
        let connection = ctx.assert_ready_connection()?;
        let message: BasicMessage = ctx.message.decode()?;

        let record = BasicMessageRecord::new(connection.id, BasicMessageRole::Receiver, &message);
        self.store(record, message).await
    }

    async fn find_by_connection_id(
        &self,
        connection_id: String,
    ) -> Result<Vec<BasicMessageRecord>, BasicMessageError> {
        let records = self
            .repo
            .find_by_query(Query::new().with("connectionId", connection_id))
            .await?;
        Ok(records)
    }

    async fn get_all(&self) -> Result<Vec<BasicMessageRecord>, BasicMessageError> {
        Ok(self.repo.get_all().await?)
    }

    async fn delete_by_id(&self, id: String) -> Result<(), BasicMessageError> {
        Ok(self.repo.delete_by_id(id).await?)
    }
}
