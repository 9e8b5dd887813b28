#[cfg(test)]
pub mod test {
    use confique::Config;
    use serde::Serialize;
    use serde_json::{Value, json};

    use crate::declaration::Declaration;
    use crate::item::Item;
    use crate::types::ItemType;

    #[derive(Config, Serialize, Debug, PartialEq)]
    pub struct AppConfig {
        /// The application host.
        #[config(default = "localhost")]
        pub host: String,

        /// The port number.
        #[config(default = 8080)]
        pub port: u16,

        /// Enable debug mode.
        #[config(default = false)]
        pub debug: bool,

        /// Database settings.
        #[config(nested)]
        pub database: DbConfig,
    }

    #[derive(Config, Serialize, Debug, PartialEq)]
    pub struct DbConfig {
        /// Connection string URL.
        pub url: Option<String>,

        /// Connection pool size.
        #[config(default = 5)]
        pub pool_size: usize,
    }

    // -- Uploads/downloads tree, declared two ways ------------------------------

    /// Built from items and nested mappings. The `type_` key declares an item
    /// named `type`.
    pub fn app_config_mapping() -> Declaration {
        Declaration::mapping([
            (
                "uploads",
                Declaration::mapping([
                    (
                        "enabled",
                        Item::named("enabled")
                            .with_type(ItemType::Bool)
                            .with_default(true)
                            .into(),
                    ),
                    ("threads", json!(1).into()),
                    ("type_", Item::named("type").with_default(Value::Null).into()),
                ]),
            ),
            (
                "downloads",
                Declaration::mapping([
                    ("content_type", json!("text/plain").into()),
                    (
                        "deep",
                        Declaration::mapping([(
                            "question",
                            json!("why would you want a config this deep?").into(),
                        )]),
                    ),
                    (
                        "threads",
                        Item::named("threads")
                            .with_type(ItemType::Int)
                            .with_default(0)
                            .into(),
                    ),
                ]),
            ),
            ("greeting", json!("Hello, world!").into()),
        ])
    }

    /// The same tree as a plain dynamic value.
    pub fn app_config_value() -> Value {
        json!({
            "uploads": {
                "enabled": true,
                "threads": 1,
                "type": null,
            },
            "downloads": {
                "content_type": "text/plain",
                "deep": {"question": "why would you want a config this deep?"},
                "threads": 0,
            },
            "greeting": "Hello, world!",
        })
    }
}
