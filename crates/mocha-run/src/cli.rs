use clap::Parser;
use miette::{IntoDiagnostic, miette};
use mocha_lang::{Engine, Namespace, Number, Scope};
use std::io::{self, BufWriter, Write};
use std::{fs, path::PathBuf};

#[derive(Parser, Debug, Default)]
#[command(name = "mocha")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To evaluate an expression:\n\
    mocha 'math.sqrt(16) + 1'\n\n\
    ## To seed variables before evaluation:\n\
    mocha --set v.speed=2 --set c.list=1,2,3 'for_each(t.x, c.list, { v.speed = v.speed + t.x })'\n\n\
    ## To read the expression from a file:\n\
    mocha -f animation.molang\n\n\
    ## To print the parsed expression:\n\
    mocha --ast 'v.x = 1 + 2 * 3'")]
#[command(about = "Evaluates MoLang-style numeric expressions.", long_about = None)]
pub struct Cli {
    /// Expression to evaluate
    #[arg(value_name = "EXPRESSION", required_unless_present = "file")]
    expression: Option<String>,

    /// Load the expression from the file
    #[arg(short, long, conflicts_with = "expression")]
    file: Option<PathBuf>,

    /// Set a variable before evaluation (`NAMESPACE.NAME=VALUE`, comma separated values set an array)
    #[arg(short, long = "set", value_name = "NAMESPACE.NAME=VALUE")]
    set: Vec<String>,

    /// Value of `this`
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    this: f64,

    /// Compile without constant folding
    #[arg(long, default_value_t = false)]
    no_optimize: bool,

    /// Maximum number of iterations of each loop
    #[arg(long, value_name = "N")]
    max_loop: Option<u64>,

    /// Print the parsed expression instead of evaluating it
    #[arg(long, default_value_t = false)]
    ast: bool,

    /// Evaluate the expression N times against the same scope
    #[arg(long, value_name = "N", default_value_t = 1)]
    repeat: usize,

    /// Log compilation details to stderr
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        let source = self.source()?;

        if self.ast {
            let node = mocha_lang::parse(&source)?;
            println!("{}", node.to_code());
            return Ok(());
        }

        let mut engine = Engine::standard();
        engine.set_optimize(!self.no_optimize);
        engine.set_max_loop_iterations(self.max_loop);

        let mut scope = self.scope(&engine)?;
        let expr = engine.compile_cached(&source)?;
        tracing::debug!(source = expr.source(), repeat = self.repeat, "evaluating");

        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());

        for _ in 0..self.repeat {
            let value = engine.evaluate(&expr, &mut scope)?;
            writeln!(handle, "{}", Number::new(value)).into_diagnostic()?;
        }

        handle.flush().into_diagnostic()
    }

    /// Default log filter, overridden by `RUST_LOG`.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "mocha_run=debug,mocha_lang=debug"
        } else {
            "mocha_run=warn,mocha_lang=warn"
        }
    }

    fn source(&self) -> miette::Result<String> {
        match (&self.expression, &self.file) {
            (_, Some(path)) => fs::read_to_string(path).into_diagnostic(),
            (Some(expression), None) => Ok(expression.clone()),
            (None, None) => Err(miette!("Either an expression or --file is required")),
        }
    }

    fn scope(&self, engine: &Engine) -> miette::Result<Scope> {
        let mut scope = Scope::new();
        scope.set_this(self.this);

        for assignment in &self.set {
            let (namespace, name, value) = parse_assignment(engine, assignment)?;
            match value {
                Value::Number(n) => scope.set(namespace, name, n),
                Value::Array(values) => scope.set_array(namespace, name, values),
            }
        }

        Ok(scope)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    Array(Vec<f64>),
}

fn parse_assignment<'a>(engine: &Engine, assignment: &'a str) -> miette::Result<(Namespace, &'a str, Value)> {
    let (target, value) = assignment
        .split_once('=')
        .ok_or_else(|| miette!("Expected `NAMESPACE.NAME=VALUE`, got `{assignment}`"))?;
    let (tag, name) = target
        .trim()
        .split_once('.')
        .filter(|(_, name)| !name.is_empty())
        .ok_or_else(|| miette!("Variable `{target}` must be qualified with a namespace"))?;

    let namespace = engine
        .namespace(tag)
        .filter(Namespace::is_writable)
        .ok_or_else(|| miette!("Cannot set variables in namespace `{tag}`"))?;

    let parse_number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| miette!("Invalid number `{}` for `{target}`", s.trim()))
    };

    let value = if value.contains(',') {
        Value::Array(value.split(',').map(parse_number).collect::<miette::Result<Vec<_>>>()?)
    } else {
        Value::Number(parse_number(value)?)
    };

    Ok((namespace, name, value))
}
