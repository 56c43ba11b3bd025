mod common;
mod curriculum;
mod routing;
