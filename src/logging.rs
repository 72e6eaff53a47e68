use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

/// Set up logging to stderr so stdout stays clean for the tables.
pub fn init_logging(level: log::LevelFilter) {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{h({d(%Y-%m-%d %H:%M:%S)} [{l}])} - {m}{n}",
        )))
        .target(Target::Stderr)
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .expect("Failed to configure logger");

    log4rs::init_config(config).expect("Failed to initialize logger");
}
