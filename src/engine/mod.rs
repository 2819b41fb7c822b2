// Expected-points model and the optimization procedures built on it.

pub mod accuracy;
pub mod lineup;
pub mod squad;
pub mod transfer;
pub mod xp;
