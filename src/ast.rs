//! # Query Model
//!
//! Types shared by every stage of the compiler.
//!
//! - **[tokens]** - Lexical tokens, the arena that owns them and the
//!   offset-to-token expression map
//! - **[property]** - Property references (`src_ip`, `flow:bytes`, `[Source IP]`)
//! - **[operators]** - The closed catalog of grammar productions and their metadata
//! - **[expressions]** - The operator tree produced by parsing or JSON decoding
//!
//! ## The three representations
//!
//! ```text
//! SELECT src_ip, COUNT(dst_ip) WHERE bytes > 1000 GROUP BY src_ip
//! ```
//!
//! is compiled into an [`Operator`] tree per clause and serialized to the
//! native JSON form:
//!
//! ```text
//! {"select": [{"source": "src_ip"}, {"count": [{"source": "dst_ip"}]}],
//!  "where": {">": [{"source": "bytes"}, 1000]},
//!  "group_by": [{"source": "src_ip"}]}
//! ```
//!
//! Both directions go through the same per-operator contract, so either form
//! can be rebuilt from the tree.
pub mod expressions;
pub mod operators;
pub mod property;
pub mod tokens;

pub use expressions::{Connective, Operand, Operator};
pub use operators::{Family, OperatorKind, OperatorMeta};
pub use property::{DEFAULT_NAMESPACE, PropertyRef};
pub use tokens::{ExpressionMap, Slot, Span, Token, TokenArena, TokenId, TokenKind};
