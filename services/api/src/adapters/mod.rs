pub mod gemini;
pub mod volcengine;

pub use gemini::GeminiAdapter;
pub use volcengine::VolcEngineAdapter;
