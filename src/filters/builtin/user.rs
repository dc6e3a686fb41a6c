//! User-defined per-pixel kernels.
//!
//! Device backends compile user code for their own language. The host device
//! instead accepts a small arithmetic expression that is evaluated for every
//! colour channel of every pixel:
//!
//! ```text
//! clamp(v * 1.5 - 0.1, 0, 1)
//! ```
//!
//! Variables: `v` (current channel), `r`, `g`, `b`, `a` (pixel channels),
//! `x`, `y` (pixel coordinates), `w`, `h` (image size) and `c` (channel
//! index). Functions: `abs`, `sqrt`, `exp`, `ln`, `sin`, `cos`, `floor`,
//! `min`, `max`, `pow`, `clamp`, `mix`.

use super::is_alpha;
use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::{Constraint, ParameterDefinition};
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register the user-defined kernel.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(UserDefined));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Var {
    Value,
    Channel(u32),
    X,
    Y,
    Width,
    Height,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Floor,
    Min,
    Max,
    Pow,
    Clamp,
    Mix,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "abs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "exp" => (Func::Exp, 1),
            "ln" => (Func::Ln, 1),
            "sin" => (Func::Sin, 1),
            "cos" => (Func::Cos, 1),
            "floor" => (Func::Floor, 1),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            "pow" => (Func::Pow, 2),
            "clamp" => (Func::Clamp, 3),
            "mix" => (Func::Mix, 3),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f32),
    Var(Var),
    Neg(Box<Expr>),
    Binary(char, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// Values visible to an expression at one channel of one pixel.
struct Env<'a> {
    pixel: &'a [f32],
    channel: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Expr {
    fn eval(&self, env: &Env) -> f32 {
        match self {
            Expr::Num(n) => *n,
            Expr::Var(var) => match var {
                Var::Value => env.pixel[env.channel as usize],
                Var::Channel(3) => env.pixel.get(3).copied().unwrap_or(1.0),
                Var::Channel(i) => env.pixel.get(*i as usize).copied().unwrap_or(0.0),
                Var::X => env.x as f32,
                Var::Y => env.y as f32,
                Var::Width => env.width as f32,
                Var::Height => env.height as f32,
                Var::Index => env.channel as f32,
            },
            Expr::Neg(e) => -e.eval(env),
            Expr::Binary(op, a, b) => {
                let (a, b) = (a.eval(env), b.eval(env));
                match op {
                    '+' => a + b,
                    '-' => a - b,
                    '*' => a * b,
                    '/' => a / b,
                    _ => a.powf(b),
                }
            }
            Expr::Call(func, args) => {
                let arg = |i: usize| args[i].eval(env);
                match func {
                    Func::Abs => arg(0).abs(),
                    Func::Sqrt => arg(0).sqrt(),
                    Func::Exp => arg(0).exp(),
                    Func::Ln => arg(0).ln(),
                    Func::Sin => arg(0).sin(),
                    Func::Cos => arg(0).cos(),
                    Func::Floor => arg(0).floor(),
                    Func::Min => arg(0).min(arg(1)),
                    Func::Max => arg(0).max(arg(1)),
                    Func::Pow => arg(0).powf(arg(1)),
                    Func::Clamp => arg(0).clamp(arg(1).min(arg(2)), arg(2).max(arg(1))),
                    Func::Mix => {
                        let t = arg(2);
                        arg(0) * (1.0 - t) + arg(1) * t
                    }
                }
            }
        }
    }
}

/// Deepest nesting of unary operators and parentheses accepted.
const MAX_DEPTH: usize = 256;

/// Recursive descent parser over the expression source.
struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn parse(src: &'a str) -> Result<Expr, String> {
        let mut parser = Parser {
            src: src.as_bytes(),
            pos: 0,
            depth: 0,
        };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != parser.src.len() {
            let ch = parser.src[parser.pos] as char;
            return Err(format!("unexpected '{}' at {}", ch, parser.pos));
        }
        Ok(expr)
    }

    fn skip_ws(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op @ (b'+' | b'-')) = self.peek() {
            self.pos += 1;
            lhs = Expr::Binary(op as char, Box::new(lhs), Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(op @ (b'*' | b'/')) = self.peek() {
            self.pos += 1;
            lhs = Expr::Binary(op as char, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.depth == MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        let expr = self.signed();
        self.depth -= 1;
        expr
    }

    fn signed(&mut self) -> Result<Expr, String> {
        if self.eat(b'-') {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        let base = self.atom()?;
        if self.eat(b'^') {
            return Ok(Expr::Binary('^', Box::new(base), Box::new(self.unary()?)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(b')') {
                    return Err(format!("expected ')' at {}", self.pos));
                }
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == b'.' => self.number(),
            Some(ch) if ch.is_ascii_alphabetic() => self.identifier(),
            Some(ch) => Err(format!("unexpected '{}' at {}", ch as char, self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn number(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_digit() || self.src[self.pos] == b'.')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).map_err(|e| e.to_string())?;
        text.parse::<f32>()
            .map(Expr::Num)
            .map_err(|_| format!("invalid number '{}'", text))
    }

    fn identifier(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_alphanumeric() {
            self.pos += 1;
        }
        let name = std::str::from_utf8(&self.src[start..self.pos]).map_err(|e| e.to_string())?;
        if self.peek() == Some(b'(') {
            let (func, arity) =
                Func::lookup(name).ok_or_else(|| format!("unknown function '{}'", name))?;
            self.pos += 1;
            let mut args = vec![self.expr()?];
            while self.eat(b',') {
                args.push(self.expr()?);
            }
            if !self.eat(b')') {
                return Err(format!("expected ')' after arguments of '{}'", name));
            }
            if args.len() != arity {
                return Err(format!("'{}' takes {} arguments, got {}", name, arity, args.len()));
            }
            return Ok(Expr::Call(func, args));
        }
        let var = match name {
            "v" => Var::Value,
            "r" => Var::Channel(0),
            "g" => Var::Channel(1),
            "b" => Var::Channel(2),
            "a" => Var::Channel(3),
            "x" => Var::X,
            "y" => Var::Y,
            "w" => Var::Width,
            "h" => Var::Height,
            "c" => Var::Index,
            other => return Err(format!("unknown variable '{}'", other)),
        };
        Ok(Expr::Var(var))
    }
}

/// Evaluates user code for every colour channel.
#[derive(Debug, Clone)]
pub struct UserDefined;

impl Kernel for UserDefined {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::UserDefined, "User Defined")
            .description("Runs user-supplied per-pixel code")
            .parameter(
                ParameterDefinition::new("code", ParameterValue::String("v".to_string()))
                    .with_description("Expression evaluated per colour channel")
                    .with_constraint(Constraint::NotEmpty),
            )
            .parameter(
                ParameterDefinition::new("work_group", ParameterValue::LocalMemory(0))
                    .with_description("Local memory to reserve per work group, in bytes"),
            )
            .tags(["custom", "expression"])
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        let code = ctx
            .get_parameter("code")?
            .as_str()
            .unwrap_or_default()
            .to_string();
        Parser::parse(&code)
            .map(|_| ())
            .map_err(|e| FilterError::InvalidParameter(format!("user code: {}", e)))
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let expr = Parser::parse(ctx.get_string("code")?).map_err(|e| FilterError::Kernel {
            filter_type: FilterType::UserDefined,
            message: e,
        })?;
        let src = ctx.input();
        let channels = src.channels as usize;
        Ok(src.map_pixels(|x, y, z, px| {
            let start = src.index(x, y, z);
            let pixel = &src.data[start..start + channels];
            for (c, out) in px.iter_mut().enumerate() {
                let c = c as u32;
                *out = if is_alpha(src.channels, c) {
                    pixel[c as usize]
                } else {
                    expr.eval(&Env {
                        pixel,
                        channel: c,
                        x,
                        y,
                        width: src.width,
                        height: src.height,
                    })
                };
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::run;

    fn eval(src: &str, pixel: &[f32]) -> f32 {
        let env = Env {
            pixel,
            channel: 0,
            x: 2,
            y: 3,
            width: 8,
            height: 8,
        };
        Parser::parse(src).unwrap().eval(&env)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[0.0]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[0.0]), 9.0);
        assert_eq!(eval("-2 ^ 2", &[0.0]), -4.0);
        assert_eq!(eval("2 ^ 3 ^ 2", &[0.0]), 512.0);
    }

    #[test]
    fn test_variables_and_functions() {
        assert_eq!(eval("v * 2", &[0.25]), 0.5);
        assert_eq!(eval("x + y * w", &[0.0]), 26.0);
        assert_eq!(eval("a", &[0.1, 0.2, 0.3]), 1.0);
        assert_eq!(eval("clamp(v, 0, 1)", &[3.0]), 1.0);
        assert_eq!(eval("mix(0, 10, 0.25)", &[0.0]), 2.5);
        assert_eq!(eval("max(g, b)", &[0.0, 0.2, 0.7]), 0.7);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Parser::parse("").is_err());
        assert!(Parser::parse("v +").is_err());
        assert!(Parser::parse("foo(v)").is_err());
        assert!(Parser::parse("min(v)").is_err());
        assert!(Parser::parse("q").is_err());
        assert!(Parser::parse("(v").is_err());
        assert!(Parser::parse("v v").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let negations = format!("{}v", "-".repeat(200_000));
        assert_eq!(
            Parser::parse(&negations).unwrap_err(),
            "expression nested too deeply"
        );
        let parens = format!("{}v{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(Parser::parse(&parens).is_err());
        let calls = format!("{}v{}", "abs(".repeat(100_000), ")".repeat(100_000));
        assert!(Parser::parse(&calls).is_err());

        let shallow = format!("{}v{}", "(".repeat(64), ")".repeat(64));
        assert_eq!(eval(&shallow, &[0.5]), 0.5);
        assert_eq!(eval(&format!("{}v", "-".repeat(100)), &[0.5]), 0.5);
    }

    #[test]
    fn test_kernel_inverts() {
        let mut src = PixelBuffer::new(1, 1, 1, 4);
        src.data = vec![0.25, 0.5, 0.75, 0.5];
        let out = run(
            &UserDefined,
            &src,
            &[("code", ParameterValue::String("1 - v".to_string()))],
        );
        assert_eq!(out.data, vec![0.75, 0.5, 0.25, 0.5]);
    }
}
