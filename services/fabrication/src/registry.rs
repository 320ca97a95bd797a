//! Machine status registry (spec.md §2, "Machine status registry";
//! SPEC_FULL §4): an in-process status register per fabrication worker,
//! consumed by an (out-of-scope) monitoring surface. Generalizes the
//! original system's per-machine status flag without reintroducing the
//! process-global-singleton anti-pattern spec.md §9 calls out — one
//! registry instance is constructed in `main` and shared via `Arc`.

use forgemesh_common::PieceType;
use parking_lot::RwLock;
use uuid::Uuid;

/// A fabrication worker's current activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Working,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: MachineState,
    current_piece_id: Option<Uuid>,
}

/// Tracks one slot per piece type; read by observability, written by
/// the worker loop that owns that piece type.
pub struct MachineRegistry {
    a: RwLock<Slot>,
    b: RwLock<Slot>,
}

impl Default for MachineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineRegistry {
    #[must_use]
    pub fn new() -> Self {
        let idle = Slot {
            state: MachineState::Idle,
            current_piece_id: None,
        };
        Self {
            a: RwLock::new(idle),
            b: RwLock::new(idle),
        }
    }

    fn slot(&self, piece_type: PieceType) -> &RwLock<Slot> {
        match piece_type {
            PieceType::A => &self.a,
            PieceType::B => &self.b,
        }
    }

    /// Mark the worker for `piece_type` as working on `piece_id`.
    pub fn set_working(&self, piece_type: PieceType, piece_id: Uuid) {
        let mut slot = self.slot(piece_type).write();
        slot.state = MachineState::Working;
        slot.current_piece_id = Some(piece_id);
    }

    /// Mark the worker for `piece_type` as idle.
    pub fn set_idle(&self, piece_type: PieceType) {
        let mut slot = self.slot(piece_type).write();
        slot.state = MachineState::Idle;
        slot.current_piece_id = None;
    }

    /// Current state for `piece_type`.
    #[must_use]
    pub fn state(&self, piece_type: PieceType) -> MachineState {
        self.slot(piece_type).read().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_tracks_work() {
        let registry = MachineRegistry::new();
        assert_eq!(registry.state(PieceType::A), MachineState::Idle);

        let piece_id = Uuid::new_v4();
        registry.set_working(PieceType::A, piece_id);
        assert_eq!(registry.state(PieceType::A), MachineState::Working);
        assert_eq!(registry.state(PieceType::B), MachineState::Idle);

        registry.set_idle(PieceType::A);
        assert_eq!(registry.state(PieceType::A), MachineState::Idle);
    }
}
