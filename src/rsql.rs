//! RSQL filter expressions for list endpoints.
//!
//! ```
//! use jamfpro_transport::rsql::RsqlBuilder;
//!
//! let filter = RsqlBuilder::new()
//! 	.eq("general.platform", "Mac")
//! 	.and()
//! 	.group(|g| g.eq("general.name", "Lab *").or().ge("id", 100))
//! 	.build();
//!
//! assert_eq!(filter.as_deref(), Some(r#"general.platform==Mac;(general.name=="Lab *",id>=100)"#));
//! ```

// self
use crate::_prelude::*;

/// Query key carrying the expression.
pub const FILTER_PARAM: &str = "filter";

/// Logical connective between two clauses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Joiner {
	/// `;`
	#[default]
	And,
	/// `,`
	Or,
}
impl Joiner {
	/// Returns the RSQL symbol.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::And => ";",
			Self::Or => ",",
		}
	}
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
	/// `==`
	Eq,
	/// `!=`
	Ne,
	/// `<`
	Lt,
	/// `<=`
	Le,
	/// `>`
	Gt,
	/// `>=`
	Ge,
	/// `=in=`
	In,
	/// `=out=`
	Out,
}
impl Comparison {
	/// Returns the RSQL symbol.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Eq => "==",
			Self::Ne => "!=",
			Self::Lt => "<",
			Self::Le => "<=",
			Self::Gt => ">",
			Self::Ge => ">=",
			Self::In => "=in=",
			Self::Out => "=out=",
		}
	}
}

/// Incremental builder for an RSQL expression.
///
/// Clauses are joined with `;` unless [`RsqlBuilder::or`] precedes them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RsqlBuilder {
	expression: String,
	pending: Option<Joiner>,
}
impl RsqlBuilder {
	/// Creates an empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Joins the next clause with `;`.
	pub fn and(mut self) -> Self {
		self.pending = Some(Joiner::And);

		self
	}

	/// Joins the next clause with `,`.
	pub fn or(mut self) -> Self {
		self.pending = Some(Joiner::Or);

		self
	}

	/// Appends `field==value`.
	pub fn eq(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Eq, value)
	}

	/// Appends `field!=value`.
	pub fn ne(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Ne, value)
	}

	/// Appends `field<value`.
	pub fn lt(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Lt, value)
	}

	/// Appends `field<=value`.
	pub fn le(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Le, value)
	}

	/// Appends `field>value`.
	pub fn gt(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Gt, value)
	}

	/// Appends `field>=value`.
	pub fn ge(self, field: &str, value: impl Display) -> Self {
		self.compare(field, Comparison::Ge, value)
	}

	/// Appends `field=in=(a,b,...)`.
	pub fn is_in<I>(self, field: &str, values: I) -> Self
	where
		I: IntoIterator,
		I::Item: Display,
	{
		self.compare_list(field, Comparison::In, values)
	}

	/// Appends `field=out=(a,b,...)`.
	pub fn out<I>(self, field: &str, values: I) -> Self
	where
		I: IntoIterator,
		I::Item: Display,
	{
		self.compare_list(field, Comparison::Out, values)
	}

	/// Appends a single comparison.
	pub fn compare(self, field: &str, op: Comparison, value: impl Display) -> Self {
		let clause = format!("{field}{}{}", op.as_str(), quote(&value.to_string()));

		self.push(clause)
	}

	/// Appends a parenthesized sub-expression; an empty group is ignored.
	pub fn group(self, f: impl FnOnce(RsqlBuilder) -> RsqlBuilder) -> Self {
		match f(RsqlBuilder::new()).build() {
			Some(inner) => self.push(format!("({inner})")),
			None => self,
		}
	}

	/// Returns `true` when no clause was added.
	pub fn is_empty(&self) -> bool {
		self.expression.is_empty()
	}

	/// Returns the expression, or `None` when empty.
	pub fn build(&self) -> Option<String> {
		(!self.is_empty()).then(|| self.expression.clone())
	}

	/// Returns the `filter` query pair, or `None` when empty.
	pub fn into_query(self) -> Option<(String, String)> {
		(!self.is_empty()).then(|| (FILTER_PARAM.to_owned(), self.expression))
	}

	fn compare_list<I>(self, field: &str, op: Comparison, values: I) -> Self
	where
		I: IntoIterator,
		I::Item: Display,
	{
		let list = values.into_iter().map(|v| quote(&v.to_string())).collect::<Vec<_>>().join(",");

		self.push(format!("{field}{}({list})", op.as_str()))
	}

	fn push(mut self, clause: String) -> Self {
		if !self.expression.is_empty() {
			self.expression.push_str(self.pending.unwrap_or_default().as_str());
		}

		self.expression.push_str(&clause);
		self.pending = None;

		self
	}
}
impl Display for RsqlBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.expression)
	}
}

/// Quotes `value` when it is empty or contains whitespace or RSQL reserved characters.
pub fn quote(value: &str) -> String {
	let needs_quotes = value.is_empty()
		|| value.chars().any(|c| c.is_whitespace() || "\"'();,=!<>~\\".contains(c));

	if !needs_quotes {
		return value.to_owned();
	}

	let mut quoted = String::with_capacity(value.len() + 2);

	quoted.push('"');

	for ch in value.chars() {
		if ch == '"' || ch == '\\' {
			quoted.push('\\');
		}
		quoted.push(ch);
	}

	quoted.push('"');

	quoted
}
