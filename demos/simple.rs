use std::time::SystemTime;

use autowire::*;

// Regular structs, described to the engine through a catalog

struct StdoutLogger {
    prefix: String,
}

impl StdoutLogger {
    fn log(&self, content: &str) {
        println!("{}{}", self.prefix, content);
    }
}

struct DateLogger;

impl DateLogger {
    fn log_date(&self, logger: &StdoutLogger) -> Result<Value, AutowireError> {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(AutowireError::callee)?;
        logger.log(&format!("{}s since epoch", now.as_secs()));
        Ok(Value::from(now.as_secs() as i64))
    }
}

fn catalog() -> Catalog {
    Catalog::new()
        .with_class(Class::interface("Logger"))
        .with_class(Class::new(
            "StdoutLogger",
            vec![Parameter::new("prefix").default("> ")],
            |args: &Arguments| Ok(StdoutLogger { prefix: args.str(0)? }),
        ))
        .with_class(
            Class::new("DateLogger", vec![], |_: &Arguments| Ok(DateLogger)).method(
                "log_date",
                vec![Parameter::new("logger").typed("Logger")],
                |d: &DateLogger, args: &Arguments| {
                    let logger = args.object::<StdoutLogger>(0)?;
                    d.log_date(&logger)
                },
            ),
        )
}

fn main() -> Result<(), AutowireError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config: AutowireConfig =
        serde_json::from_str(r#"{"max_depth": 32}"#).map_err(AutowireError::callee)?;
    let container = Container::with_autowire(std::sync::Arc::new(Autowire::with_config(
        catalog(),
        config,
    )));
    container.set("Logger", "StdoutLogger".into());

    // Direct resolution: the receiver and the logger are autowired
    container.call(("DateLogger", "log_date"), &Inputs::new())?;

    // Compiled resolution: the decisions are stored as text and replayed
    let plan = container.compile(("DateLogger", "log_date"), &Overrides::new(), true)?;
    println!("{plan}");
    let plan = InvocationPlan::load(&plan.source()?, container.autowire().catalog().clone())?;
    plan.invoke(&container, &Inputs::new())?;

    Ok(())
}
