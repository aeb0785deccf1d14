use crate::config::{Config, MeterDeclaration};
use crate::models::MsgType;
use log::{debug, error, warn};
use serde_json::Number;
use std::collections::{BTreeSet, HashMap};

/// Fully resolved settings of one watched meter
#[derive(Debug, Clone, PartialEq)]
pub struct MeterConfig {
    pub id: u64,
    pub msg_type: MsgType,
    /// May be empty, the topic then only carries the id
    pub name: String,
    pub reading_field: String,
    pub multiplier: Number,
    pub other_fields: Vec<String>,
    pub retain: bool,
}

/// Values used for everything a declaration leaves out
#[derive(Debug, Clone)]
pub struct MeterDefaults {
    pub msg_type: String,
    pub multiplier: Number,
    pub retain: bool,
}

impl MeterDefaults {
    pub fn from_config(config: &Config) -> Self {
        MeterDefaults {
            msg_type: config.default_msgtype.clone(),
            multiplier: config.default_multiplier.clone(),
            retain: config.mqtt.retain_default,
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    meters: HashMap<u64, MeterConfig>,
}

impl Registry {
    /// Later declarations of the same id replace earlier ones.
    /// Declarations with an unknown message type are logged and skipped.
    pub fn build(declarations: &[MeterDeclaration], defaults: &MeterDefaults) -> Self {
        let mut meters = HashMap::new();

        for decl in declarations {
            let msg_type_name = decl.msgtype.clone().unwrap_or(defaults.msg_type.clone()).to_lowercase();
            let msg_type = match MsgType::from_str(&msg_type_name) {
                Some(t) => t,
                None => {
                    error!("Meter {} uses unknown message type '{msg_type_name}', ignoring it", decl.id);
                    continue;
                }
            };

            let meter = MeterConfig {
                id: decl.id,
                msg_type,
                name: decl.name.clone().unwrap_or_default(),
                reading_field: decl.reading_field.clone().unwrap_or(msg_type.schema().reading_field.to_string()),
                multiplier: decl.multiplier.clone().unwrap_or(defaults.multiplier.clone()),
                other_fields: decl.other_fields.clone().unwrap_or_default(),
                retain: decl.retain.unwrap_or(defaults.retain),
            };

            debug!("Watching meter {meter:?}");
            if meters.insert(decl.id, meter).is_some() {
                warn!("Meter {} declared more than once, the last declaration wins", decl.id);
            }
        }

        if meters.is_empty() {
            warn!("No meters configured properly, check the 'meters' list of the config. Nothing will be published");
        }

        return Registry { meters };
    }

    pub fn from_config(config: &Config) -> Self {
        return Self::build(&config.meters, &MeterDefaults::from_config(config));
    }

    pub fn get(&self, id: u64) -> Option<&MeterConfig> {
        self.meters.get(&id)
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Distinct message types of all watched meters, in schema order
    pub fn msg_types(&self) -> Vec<MsgType> {
        let set: BTreeSet<MsgType> = self.meters.values().map(|m| m.msg_type).collect();
        set.into_iter().collect()
    }

    /// Value for rtlamr's `-msgtype=` argument
    pub fn msg_types_arg(&self) -> String {
        self.msg_types().iter().map(|t| t.to_string()).collect::<Vec<String>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> MeterDefaults {
        MeterDefaults { msg_type: "scm".to_string(), multiplier: Number::from(1), retain: false }
    }

    fn decl(id: u64) -> MeterDeclaration {
        MeterDeclaration {
            id,
            msgtype: None,
            name: None,
            reading_field: None,
            multiplier: None,
            other_fields: None,
            retain: None,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let registry = Registry::build(&[decl(60210816)], &defaults());
        let meter = registry.get(60210816).unwrap();
        assert_eq!(meter.msg_type, MsgType::Scm);
        assert_eq!(meter.name, "");
        assert_eq!(meter.reading_field, "Consumption");
        assert_eq!(meter.multiplier.as_u64(), Some(1));
        assert!(meter.other_fields.is_empty());
        assert!(!meter.retain);
    }

    #[test]
    fn test_overrides_and_case() {
        let mut d = decl(25808139);
        d.msgtype = Some("IDM".to_string());
        d.name = Some("Electric-IDM".to_string());
        d.multiplier = Some(Number::from(1000));
        d.retain = Some(true);
        let registry = Registry::build(&[d], &defaults());
        let meter = registry.get(25808139).unwrap();
        assert_eq!(meter.msg_type, MsgType::Idm);
        assert_eq!(meter.reading_field, "LastConsumptionCount");
        assert_eq!(meter.multiplier.as_u64(), Some(1000));
        assert!(meter.retain);
    }

    #[test]
    fn test_last_declaration_wins() {
        let mut first = decl(1);
        first.name = Some("first".to_string());
        let mut second = decl(1);
        second.name = Some("second".to_string());
        let registry = Registry::build(&[first, second], &defaults());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(1).unwrap().name, "second");
    }

    #[test]
    fn test_unknown_msg_type_skipped() {
        let mut bad = decl(2);
        bad.msgtype = Some("ert".to_string());
        let registry = Registry::build(&[bad, decl(3)], &defaults());
        assert!(registry.get(2).is_none());
        assert!(registry.get(3).is_some());
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::build(&[], &defaults());
        assert!(registry.is_empty());
        assert_eq!(registry.msg_types_arg(), "");
    }

    #[test]
    fn test_msg_types_distinct() {
        let mut a = decl(1);
        a.msgtype = Some("r900".to_string());
        let mut b = decl(2);
        b.msgtype = Some("scm".to_string());
        let mut c = decl(3);
        c.msgtype = Some("R900".to_string());
        let registry = Registry::build(&[a, b, c], &defaults());
        assert_eq!(registry.msg_types(), vec![MsgType::Scm, MsgType::R900]);
        assert_eq!(registry.msg_types_arg(), "scm,r900");
    }
}
