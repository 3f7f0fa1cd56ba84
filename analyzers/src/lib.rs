pub mod brightness_analyzer;
pub mod result;

pub use result::{AnalysisMode, AnalysisResult, ParseModeError};

pub trait Analyzer {
    type Output;
    type Input: ?Sized;
    type Error;

    fn analyze(input: &Self::Input) -> Result<Self::Output, Self::Error>;
}
