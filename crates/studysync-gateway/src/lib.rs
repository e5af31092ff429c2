//! HTTP surface for the StudySync chatbot: Telex A2A JSON-RPC and the
//! simple sender/text envelope on one route.

pub mod app;
pub mod env;
pub mod forward;
pub mod http;

pub use app::{build_router, AppState};
pub use env::load_dotenv;
pub use forward::{ConversationForwarder, Forwarded, Outcome};
