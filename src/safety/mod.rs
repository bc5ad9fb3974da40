mod analyzer;
mod schema;

pub use analyzer::{GeminiAnalyzer, SafetyAnalyzer, SafetyError};
pub use schema::{CrowdDensity, RiskLevel, SafetyContext, SafetyNarration, Sensitivity};
