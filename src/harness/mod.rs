//! Test and measurement harnesses: seeded synthetic datasets, the
//! reference/candidate accuracy suite, and the performance suite.

pub mod accuracy;
pub mod perf;
pub mod synth;
