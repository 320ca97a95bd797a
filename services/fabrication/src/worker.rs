//! Fabrication worker (spec.md §4.5): one process-local task per piece
//! type, consuming `piece_<t>.requested` and emitting `piece.produced`
//! after a simulated bounded work interval.

use crate::registry::MachineRegistry;
use async_trait::async_trait;
use forgemesh_bus::{BusAdapter, Envelope, Exchange, Handler, Outcome};
use forgemesh_common::PieceType;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const MIN_WORK_SECS: f64 = 1.0;
const MAX_WORK_SECS: f64 = 3.0;

#[derive(Debug, Deserialize)]
pub struct PieceRequested {
    order_id: Uuid,
    piece_id: Uuid,
}

#[derive(Debug, Serialize)]
struct PieceProduced {
    order_id: Uuid,
    piece_id: Uuid,
}

/// Handles `piece_<t>.requested` for one piece type.
pub struct FabricationWorker {
    pub piece_type: PieceType,
    pub registry: Arc<MachineRegistry>,
    pub bus: Arc<BusAdapter>,
}

#[async_trait]
impl Handler<PieceRequested> for FabricationWorker {
    async fn handle(&self, envelope: Envelope<PieceRequested>) -> Outcome {
        let PieceRequested { order_id, piece_id } = envelope.body;

        self.registry.set_working(self.piece_type, piece_id);
        let work_secs = rand::thread_rng().gen_range(MIN_WORK_SECS..=MAX_WORK_SECS);
        tokio::time::sleep(Duration::from_secs_f64(work_secs)).await;
        self.registry.set_idle(self.piece_type);

        info!(%order_id, %piece_id, piece_type = %self.piece_type, work_secs, "piece fabricated");

        let payload = PieceProduced { order_id, piece_id };
        if let Err(err) = self
            .bus
            .publish(Exchange::Events, "piece.produced", &payload)
            .await
        {
            warn!(%order_id, %piece_id, %err, "failed to publish piece.produced");
            return Outcome::Retry;
        }
        Outcome::Ack
    }
}
