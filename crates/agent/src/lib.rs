//! Natural-language front end over the cloud inventory.
//!
//! A question flows through four stages:
//! 1. **Classification** (`classifier`): keyword rules pick the domains
//!    (cost, compute, storage, database, load balancer), a cost service filter
//!    and an optional month.
//! 2. **Assembly** (`context`): only the scanners and cost fetches the query
//!    needs are run; unselected domains stay absent.
//! 3. **Narration** (`narrative`, `prompt`, `llm`): the collected context is
//!    rendered into a prompt and sent to the generative backend. Backend
//!    failures become an apology, never an error.
//! 4. **Audit** (`runtime`): every answer is appended to the query audit log.
//!
//! The backend only writes prose. Which resources exist and what they cost
//! always comes from the provider APIs.

pub mod classifier;
pub mod context;
pub mod llm;
pub mod narrative;
pub mod prompt;
pub mod runtime;

pub use classifier::{Classification, Domain, QueryClassifier};
pub use context::{ContextAssembler, QueryContext};
pub use llm::{client_from_config, LlmClient, LlmError};
pub use narrative::{Narrative, NarrativeResponder, StructuredInventory};
pub use runtime::{AgentRuntime, Answer};
