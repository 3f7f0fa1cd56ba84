pub mod image_parser;

pub trait Parser {
    type Input;
    type Output;
    type Error;

    fn parse(input: Self::Input) -> Result<Self::Output, Self::Error>;
}
