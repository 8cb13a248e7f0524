// Expression Engine Module
// Restricted interpreter for parameter combinator expressions:
// literals, arithmetic and whitelisted named calls only

pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use evaluator::{evaluate_values, EvalError, Evaluator, Value};
pub use functions::BuiltinFunctions;
pub use lexer::{LexError, Lexer, Token};
pub use parser::{BinaryOp, Expr, ExprParser, ParseExprError, UnaryOp};
