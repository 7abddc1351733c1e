//! Configuration resolution and cross-field validation
//!
//! Two property sources share one key space. Command-line overrides may
//! spell a key with dashes (`store-username`) because flags cannot carry
//! dots; that spelling wins over the dotted override, which wins over the
//! file defaults.
//!
//! Resolution never stops at the first problem. Every key is examined and
//! all errors come back together so a user fixes everything in one pass.

use super::keys;
use super::{
    Configuration, Credentials, Endpoint, EtlTarget, FilesystemSource, Packaging, ParamNames,
    Properties, RelationalSource, DEFAULT_WILDCARD,
};
use crate::error::ValidationErrors;
use crate::naming::OutputTemplate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Keys that must be set together or not at all, with the group name
/// errors are reported under
pub const ALL_OR_NONE: &[(&str, &[&str])] = &[
    ("etl.*", &[keys::ETL_PROCESS_URL, keys::ETL_GRAPH]),
    (
        "jdbc.*",
        &[
            keys::JDBC_DRIVER,
            keys::JDBC_DRIVER_PATH,
            keys::JDBC_USERNAME,
            keys::JDBC_URL,
        ],
    ),
];

/// Keys of which at most one may be set
pub const ALTERNATIVES: &[&[&str]] = &[&[keys::STORE_UPLOAD_ARCHIVE, keys::STORE_UPLOAD_MANIFEST]];

/// Command-line spelling of a dotted key: `jdbc.url` becomes `jdbc-url`
pub fn dashed(key: &str) -> String {
    key.replace('.', "-")
}

/// Read-only view over overrides and defaults
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    overrides: &'a Properties,
    defaults: &'a Properties,
}

impl<'a> Sources<'a> {
    pub fn new(overrides: &'a Properties, defaults: &'a Properties) -> Self {
        Self {
            overrides,
            defaults,
        }
    }

    /// Look a dotted key up: dashed override, dotted override, default
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.overrides
            .get(&dashed(key))
            .or_else(|| self.overrides.get(key))
            .or_else(|| self.defaults.get(key))
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn keys(&self) -> BTreeSet<&'a str> {
        self.overrides.keys().chain(self.defaults.keys()).collect()
    }

    /// Every `<prefix><name>` key, keyed by `<name>`
    pub fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.with_prefix_and_suffix(prefix, "")
    }

    /// Every `<prefix><name><suffix>` key, keyed by `<name>`
    ///
    /// Overrides may use the dashed spelling (`data-orders-sql`), which
    /// wins over the dotted one for the same name.
    pub fn with_prefix_and_suffix(&self, prefix: &str, suffix: &str) -> BTreeMap<String, String> {
        let mut found = BTreeMap::new();
        for key in self.keys() {
            if let (Some(name), Some(value)) = (name_between(key, prefix, suffix), self.get(key)) {
                found.insert(name.to_string(), value.to_string());
            }
        }

        let (prefix, suffix) = (dashed(prefix), dashed(suffix));
        for key in self.overrides.keys() {
            if let (Some(name), Some(value)) =
                (name_between(key, &prefix, &suffix), self.overrides.get(key))
            {
                found.insert(name.to_string(), value.to_string());
            }
        }
        found
    }
}

fn name_between<'k>(key: &'k str, prefix: &str, suffix: &str) -> Option<&'k str> {
    let name = key.strip_prefix(prefix)?.strip_suffix(suffix)?;
    (!name.is_empty()).then_some(name)
}

/// Collects errors while reading keys
struct Validator<'a> {
    sources: Sources<'a>,
    errors: ValidationErrors,
}

impl<'a> Validator<'a> {
    fn required(&mut self, key: &str) -> Option<&'a str> {
        let value = self.sources.get(key);
        if value.is_none() {
            self.errors
                .push(key, format!("{key} is a mandatory property"));
        }
        value
    }

    fn endpoint(&mut self, key: &str) -> Option<Endpoint> {
        let raw = self.sources.get(key)?;
        match Endpoint::parse(raw) {
            Ok(endpoint) => Some(endpoint),
            Err(reason) => {
                self.errors
                    .push(key, format!("The URL for {key} is invalid: {reason}"));
                None
            }
        }
    }

    fn template(&mut self, key: &str) -> Option<OutputTemplate> {
        let raw = self.sources.get(key)?;
        match OutputTemplate::parse(raw) {
            Ok(template) => Some(template),
            Err(reason) => {
                self.errors
                    .push(key, format!("Invalid output name template for {key}: {reason}"));
                None
            }
        }
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        let Some(raw) = self.sources.get(key) else {
            return default;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => {
                self.errors
                    .push(key, format!("{key} must be true or false, got '{raw}'"));
                default
            }
        }
    }

    fn name_or(&self, key: &str, default: &str) -> String {
        self.sources.get(key).unwrap_or(default).to_string()
    }

    fn all_or_none(&mut self) {
        for (group, members) in ALL_OR_NONE {
            let set: Vec<&str> = members
                .iter()
                .copied()
                .filter(|k| self.sources.is_set(k))
                .collect();
            if !set.is_empty() && set.len() != members.len() {
                let missing: Vec<&str> = members
                    .iter()
                    .copied()
                    .filter(|k| !self.sources.is_set(k))
                    .collect();
                self.errors.push(
                    *group,
                    format!(
                        "All or none of {} must be set; missing {}",
                        members.join(", "),
                        missing.join(", ")
                    ),
                );
            }
        }
    }

    fn alternatives(&mut self) {
        for members in ALTERNATIVES {
            let mut first: Option<&str> = None;
            for key in members.iter().copied() {
                if !self.sources.is_set(key) {
                    continue;
                }
                match first {
                    None => first = Some(key),
                    Some(previous) => self.errors.push(
                        key,
                        format!("Only one of {} may be set; {previous} is already set", members.join(", ")),
                    ),
                }
            }
        }
    }
}

/// Resolve and validate a configuration from overrides and defaults
pub fn resolve(
    overrides: &Properties,
    defaults: &Properties,
) -> std::result::Result<Configuration, ValidationErrors> {
    let sources = Sources::new(overrides, defaults);
    let mut v = Validator {
        sources,
        errors: ValidationErrors::new(),
    };

    let username = v.required(keys::STORE_USERNAME);
    let password = v.required(keys::STORE_PASSWORD);

    let upload = v.endpoint(keys::STORE_UPLOAD_URL);
    let process = v.endpoint(keys::ETL_PROCESS_URL);
    let graph = sources.get(keys::ETL_GRAPH);

    let etl_params = sources.with_prefix(keys::ETL_PARAM_PREFIX);
    let etl_hidden_params = sources.with_prefix(keys::ETL_HIDDEN_PARAM_PREFIX);

    let param_names = ParamNames {
        archive: v.name_or(keys::PARAM_NAME_ARCHIVE, super::DEFAULT_PARAM_ARCHIVE),
        archive_url: v.name_or(keys::PARAM_NAME_ARCHIVE_URL, super::DEFAULT_PARAM_ARCHIVE_URL),
        archive_url_nocreds: v.name_or(
            keys::PARAM_NAME_ARCHIVE_URL_NOCREDS,
            super::DEFAULT_PARAM_ARCHIVE_URL_NOCREDS,
        ),
        manifest: v.name_or(keys::PARAM_NAME_MANIFEST, super::DEFAULT_PARAM_MANIFEST),
        manifest_url: v.name_or(keys::PARAM_NAME_MANIFEST_URL, super::DEFAULT_PARAM_MANIFEST_URL),
        manifest_url_nocreds: v.name_or(
            keys::PARAM_NAME_MANIFEST_URL_NOCREDS,
            super::DEFAULT_PARAM_MANIFEST_URL_NOCREDS,
        ),
        username: v.name_or(keys::PARAM_NAME_USERNAME, super::DEFAULT_PARAM_USERNAME),
        password: v.name_or(keys::PARAM_NAME_PASSWORD, super::DEFAULT_PARAM_PASSWORD),
        now: v.name_or(keys::PARAM_NAME_NOW, super::DEFAULT_PARAM_NOW),
    };

    let archive = v.template(keys::STORE_UPLOAD_ARCHIVE);
    let manifest = v.template(keys::STORE_UPLOAD_MANIFEST);
    let send_credentials = v.boolean(keys::STORE_SEND_CREDENTIALS, false);

    let filesystem = sources
        .get(keys::FILESYSTEM_INPUT_DIR)
        .map(|dir| FilesystemSource {
            input_dir: PathBuf::from(dir),
            wildcard: sources
                .get(keys::FILESYSTEM_WILDCARD)
                .unwrap_or(DEFAULT_WILDCARD)
                .to_string(),
        });

    let datasets = sources.with_prefix_and_suffix(keys::DATA_PREFIX, keys::DATA_SQL_SUFFIX);
    let jdbc = (
        sources.get(keys::JDBC_DRIVER),
        sources.get(keys::JDBC_DRIVER_PATH),
        sources.get(keys::JDBC_USERNAME),
        sources.get(keys::JDBC_URL),
    );

    v.all_or_none();
    v.alternatives();

    let Validator { errors, .. } = v;
    if !errors.is_empty() {
        return Err(errors);
    }
    let (Some(username), Some(password)) = (username, password) else {
        return Err(errors);
    };

    let relational = match jdbc {
        (Some(driver), Some(driver_path), Some(jdbc_user), Some(url)) => Some(RelationalSource {
            driver: driver.to_string(),
            driver_path: PathBuf::from(driver_path),
            username: jdbc_user.to_string(),
            password: sources.get(keys::JDBC_PASSWORD).map(str::to_string),
            url: url.to_string(),
            datasets,
        }),
        _ => {
            if !datasets.is_empty() {
                tracing::warn!(
                    datasets = datasets.len(),
                    "data.*.sql entries are ignored because jdbc.* is not configured"
                );
            }
            None
        }
    };

    let packaging = match (archive, manifest) {
        (Some(template), _) => Some(Packaging::Archive(template)),
        (None, Some(template)) => Some(Packaging::Manifest(template)),
        (None, None) => None,
    };

    let etl = process.zip(graph).map(|(process, graph)| EtlTarget {
        process,
        graph: graph.to_string(),
    });

    Ok(Configuration {
        credentials: Credentials {
            username: username.to_string(),
            password: password.to_string(),
        },
        upload,
        packaging,
        send_credentials,
        etl,
        etl_params,
        etl_hidden_params,
        param_names,
        filesystem,
        relational,
    })
}
