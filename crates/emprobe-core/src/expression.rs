#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (at character {position})")]
pub struct ExpressionError {
    pub position: usize,
    pub message: String,
}

impl ExpressionError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

pub trait ModeExpression {
    /// `values` follows the variable order given at parse time.
    fn evaluate(&self, values: &[f64]) -> f64;
}

pub trait ExpressionParser {
    fn parse(
        &self,
        source: &str,
        variables: &[&str],
    ) -> Result<Box<dyn ModeExpression>, ExpressionError>;
}

/// Recursive-descent parser for arithmetic formulas with the usual math
/// functions, comparisons and `if(cond, then, else)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionParser;

impl FunctionParser {
    pub fn compile(&self, source: &str, variables: &[&str]) -> Result<Expression, ExpressionError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            index: 0,
            depth: 0,
            variables,
        };
        let root = parser.parse_expr()?;
        match parser.peek() {
            Token {
                kind: TokenKind::End,
                ..
            } => Ok(Expression { root }),
            token => Err(ExpressionError::new(token.position, "unexpected trailing input")),
        }
    }
}

impl ExpressionParser for FunctionParser {
    fn parse(
        &self,
        source: &str,
        variables: &[&str],
    ) -> Result<Box<dyn ModeExpression>, ExpressionError> {
        Ok(Box::new(self.compile(source, variables)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl ModeExpression for Expression {
    fn evaluate(&self, values: &[f64]) -> f64 {
        self.root.evaluate(values)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Op(Operator),
    LParen,
    RParen,
    Comma,
    Bang,
    End,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    And,
    Or,
}

impl Operator {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        let truth = |value: bool| if value { 1.0 } else { 0.0 };
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
            Self::Mod => lhs % rhs,
            Self::Pow => lhs.powf(rhs),
            Self::Less => truth(lhs < rhs),
            Self::LessEq => truth(lhs <= rhs),
            Self::Greater => truth(lhs > rhs),
            Self::GreaterEq => truth(lhs >= rhs),
            Self::Eq => truth(lhs == rhs),
            Self::NotEq => truth(lhs != rhs),
            Self::And => truth(lhs != 0.0 && rhs != 0.0),
            Self::Or => truth(lhs != 0.0 || rhs != 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Sqrt,
    Abs,
    Pow,
    Min,
    Max,
    Floor,
    Ceil,
    If,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "sqrt" => Self::Sqrt,
            "abs" => Self::Abs,
            "pow" => Self::Pow,
            "min" => Self::Min,
            "max" => Self::Max,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "if" => Self::If,
            _ => return None,
        };
        Some(function)
    }

    fn arity(self) -> usize {
        match self {
            Self::Atan2 | Self::Pow | Self::Min | Self::Max => 2,
            Self::If => 3,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Sin => args[0].sin(),
            Self::Cos => args[0].cos(),
            Self::Tan => args[0].tan(),
            Self::Asin => args[0].asin(),
            Self::Acos => args[0].acos(),
            Self::Atan => args[0].atan(),
            Self::Atan2 => args[0].atan2(args[1]),
            Self::Sinh => args[0].sinh(),
            Self::Cosh => args[0].cosh(),
            Self::Tanh => args[0].tanh(),
            Self::Exp => args[0].exp(),
            Self::Log => args[0].ln(),
            Self::Log10 => args[0].log10(),
            Self::Sqrt => args[0].sqrt(),
            Self::Abs => args[0].abs(),
            Self::Pow => args[0].powf(args[1]),
            Self::Min => args[0].min(args[1]),
            Self::Max => args[0].max(args[1]),
            Self::Floor => args[0].floor(),
            Self::Ceil => args[0].ceil(),
            Self::If => {
                if args[0] != 0.0 {
                    args[1]
                } else {
                    args[2]
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Variable(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary {
        op: Operator,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Call(Function, Vec<Node>),
}

impl Node {
    fn binary(op: Operator, lhs: Node, rhs: Node) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn evaluate(&self, values: &[f64]) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::Variable(index) => values.get(*index).copied().unwrap_or(f64::NAN),
            Self::Neg(inner) => -inner.evaluate(values),
            Self::Not(inner) => {
                if inner.evaluate(values) == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Binary { op, lhs, rhs } => op.apply(lhs.evaluate(values), rhs.evaluate(values)),
            Self::Call(Function::If, args) => {
                if args[0].evaluate(values) != 0.0 {
                    args[1].evaluate(values)
                } else {
                    args[2].evaluate(values)
                }
            }
            Self::Call(function, args) => {
                let evaluated: Vec<f64> = args.iter().map(|arg| arg.evaluate(values)).collect();
                function.apply(&evaluated)
            }
        }
    }
}

fn lex(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let c = chars[index];
        let position = index;
        let single = |kind: TokenKind| Token { kind, position };

        if c.is_whitespace() {
            index += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(index + 1).is_some_and(char::is_ascii_digit)) {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                index += 1;
            }
            if index < chars.len() && matches!(chars[index], 'e' | 'E') {
                let mut lookahead = index + 1;
                if lookahead < chars.len() && matches!(chars[lookahead], '+' | '-') {
                    lookahead += 1;
                }
                if lookahead < chars.len() && chars[lookahead].is_ascii_digit() {
                    index = lookahead;
                    while index < chars.len() && chars[index].is_ascii_digit() {
                        index += 1;
                    }
                }
            }
            let text: String = chars[start..index].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::new(start, format!("malformed number '{text}'")))?;
            tokens.push(single(TokenKind::Number(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            tokens.push(single(TokenKind::Ident(chars[start..index].iter().collect())));
            continue;
        }

        let next = chars.get(index + 1).copied();
        let (kind, width) = match (c, next) {
            ('+', _) => (TokenKind::Op(Operator::Add), 1),
            ('-', _) => (TokenKind::Op(Operator::Sub), 1),
            ('*', _) => (TokenKind::Op(Operator::Mul), 1),
            ('/', _) => (TokenKind::Op(Operator::Div), 1),
            ('%', _) => (TokenKind::Op(Operator::Mod), 1),
            ('^', _) => (TokenKind::Op(Operator::Pow), 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('<', Some('=')) => (TokenKind::Op(Operator::LessEq), 2),
            ('<', _) => (TokenKind::Op(Operator::Less), 1),
            ('>', Some('=')) => (TokenKind::Op(Operator::GreaterEq), 2),
            ('>', _) => (TokenKind::Op(Operator::Greater), 1),
            ('=', Some('=')) => (TokenKind::Op(Operator::Eq), 2),
            ('=', _) => (TokenKind::Op(Operator::Eq), 1),
            ('!', Some('=')) => (TokenKind::Op(Operator::NotEq), 2),
            ('!', _) => (TokenKind::Bang, 1),
            ('&', Some('&')) => (TokenKind::Op(Operator::And), 2),
            ('&', _) => (TokenKind::Op(Operator::And), 1),
            ('|', Some('|')) => (TokenKind::Op(Operator::Or), 2),
            ('|', _) => (TokenKind::Op(Operator::Or), 1),
            _ => {
                return Err(ExpressionError::new(
                    position,
                    format!("unexpected character '{c}'"),
                ));
            }
        };
        tokens.push(single(kind));
        index += width;
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: chars.len(),
    });
    Ok(tokens)
}

/// Deepest chain of parentheses, calls, signs and exponents accepted.
const MAX_NESTING: usize = 128;

struct Parser<'a> {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
    variables: &'a [&'a str],
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn peek_operator(&self, candidates: &[Operator]) -> Option<Operator> {
        match self.peek().kind {
            TokenKind::Op(op) if candidates.contains(&op) => Some(op),
            _ => None,
        }
    }

    fn expect(&mut self, expected: TokenKind, description: &str) -> Result<(), ExpressionError> {
        let token = self.next();
        if token.kind == expected {
            Ok(())
        } else {
            Err(ExpressionError::new(
                token.position,
                format!("expected {description}"),
            ))
        }
    }

    fn parse_expr(&mut self) -> Result<Node, ExpressionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_and()?;
        while let Some(op) = self.peek_operator(&[Operator::Or]) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_cmp()?;
        while let Some(op) = self.peek_operator(&[Operator::And]) {
            self.next();
            let rhs = self.parse_cmp()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Node, ExpressionError> {
        let lhs = self.parse_add()?;
        let comparison = self.peek_operator(&[
            Operator::Less,
            Operator::LessEq,
            Operator::Greater,
            Operator::GreaterEq,
            Operator::Eq,
            Operator::NotEq,
        ]);
        if let Some(op) = comparison {
            self.next();
            let rhs = self.parse_add()?;
            return Ok(Node::binary(op, lhs, rhs));
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_mul()?;
        while let Some(op) = self.peek_operator(&[Operator::Add, Operator::Sub]) {
            self.next();
            let rhs = self.parse_mul()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek_operator(&[Operator::Mul, Operator::Div, Operator::Mod]) {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Node::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    // Every nesting path re-enters here, so this is where depth is bounded.
    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        if self.depth >= MAX_NESTING {
            return Err(ExpressionError::new(
                self.peek().position,
                "expression nested too deeply",
            ));
        }
        self.depth += 1;
        let node = self.parse_signed();
        self.depth -= 1;
        node
    }

    fn parse_signed(&mut self) -> Result<Node, ExpressionError> {
        if self.peek_operator(&[Operator::Sub]).is_some() {
            self.next();
            return Ok(Node::Neg(Box::new(self.parse_unary()?)));
        }
        if self.peek_operator(&[Operator::Add]).is_some() {
            self.next();
            return self.parse_unary();
        }
        if self.peek().kind == TokenKind::Bang {
            self.next();
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_pow()
    }

    // Right associative; the exponent may carry its own sign.
    fn parse_pow(&mut self) -> Result<Node, ExpressionError> {
        let base = self.parse_primary()?;
        if self.peek_operator(&[Operator::Pow]).is_some() {
            self.next();
            let exponent = self.parse_unary()?;
            return Ok(Node::binary(Operator::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        let token = self.next();
        match token.kind {
            TokenKind::Number(value) => Ok(Node::Number(value)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.parse_identifier(&name, token.position),
            TokenKind::End => Err(ExpressionError::new(
                token.position,
                "unexpected end of expression",
            )),
            _ => Err(ExpressionError::new(token.position, "expected a value")),
        }
    }

    fn parse_identifier(&mut self, name: &str, position: usize) -> Result<Node, ExpressionError> {
        if let Some(index) = self.variables.iter().position(|variable| *variable == name) {
            return Ok(Node::Variable(index));
        }
        if name == "pi" {
            return Ok(Node::Number(std::f64::consts::PI));
        }
        let Some(function) = Function::from_name(name) else {
            return Err(ExpressionError::new(
                position,
                format!("unknown identifier '{name}'"),
            ));
        };

        self.expect(TokenKind::LParen, "'(' after function name")?;
        let mut args = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if self.peek().kind == TokenKind::Comma {
                    self.next();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close argument list")?;

        if args.len() != function.arity() {
            return Err(ExpressionError::new(
                position,
                format!(
                    "function '{name}' takes {} argument(s), got {}",
                    function.arity(),
                    args.len()
                ),
            ));
        }
        Ok(Node::Call(function, args))
    }
}
