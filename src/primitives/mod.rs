//! Grammar-side primitives: scope names, grammars, tokenization
//!
//! | Module | Role |
//! |--------|------|
//! | `scope_name` | dotted scope identifiers and ancestry |
//! | `grammar` | TextMate grammar model, loading, rule resolution |
//! | `parser` | grammar registry; owns the tokenizer entry point |
//! | `line_state` | scopes and the scope stack carried between lines |
//! | `tokenizer` | line tokenization |
//! | `tokenized_line` | tokens of one line and theme application |

pub mod grammar;
pub mod line_state;
pub mod parser;
pub mod scope_name;
pub mod tokenized_line;
mod tokenizer;
