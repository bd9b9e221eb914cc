//! Assistant management: records, the persisted slot, the session manager and
//! its HTTP surface.

pub mod manager;
pub mod model;
pub mod routes;
pub mod store;
pub mod ws;

pub use manager::AssistantManager;
pub use model::{
    Assistant, AssistantEvent, AssistantSnapshot, AssistantTool, ContextDocument,
    CreateAssistantFields, IconData,
};
pub use routes::{AssistantRouteState, assistant_routes};
pub use store::{
    AssistantStore, DatabaseAssistantStore, FileAssistantStore, MemoryAssistantStore,
};
pub use ws::assistant_ws_routes;
