pub mod config;
pub mod template;

pub use config::{active_profile, load_dotenv, profile_label};
pub use template::{placeholders, render, render_partial, Params, TemplateError};
