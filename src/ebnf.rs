//! Main module for ebnf2cfg library functionality

pub mod converter;
pub mod editor;
pub mod grammar;
pub mod lexer;
pub mod parser;
