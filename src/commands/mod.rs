pub mod genotypes;
pub mod ids;
pub mod variants;

pub use genotypes::genotypes;
pub use ids::ids;
pub use variants::variants;
