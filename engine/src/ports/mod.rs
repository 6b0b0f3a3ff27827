//! Ports: the seams between the engine and its collaborators.

mod launcher;
mod observer;

pub use launcher::{ExitFuture, ProcessLauncher, SpawnRecipe, SpawnedChild};
pub use observer::{Event, EventKind, Observer, ObserverSet};
