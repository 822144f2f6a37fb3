//! App settings as a flat string map

use crate::api::common::StringDictionary;
use crate::api::sites::NameValuePair;
use std::collections::HashMap;

pub const HEALTH_CHECK_MAX_PING_FAILURES: &str = "WEBSITE_HEALTHCHECK_MAXPINGFAILURES";
pub const DOCKER_REGISTRY_SERVER_URL: &str = "DOCKER_REGISTRY_SERVER_URL";
pub const DOCKER_REGISTRY_SERVER_USERNAME: &str = "DOCKER_REGISTRY_SERVER_USERNAME";
pub const DOCKER_REGISTRY_SERVER_PASSWORD: &str = "DOCKER_REGISTRY_SERVER_PASSWORD";

/// Keys the service adds on its own or that first-class attributes own
const MANAGED_APP_SETTINGS: &[&str] = &[
    DOCKER_REGISTRY_SERVER_URL,
    DOCKER_REGISTRY_SERVER_USERNAME,
    DOCKER_REGISTRY_SERVER_PASSWORD,
    "DIAGNOSTICS_AZUREBLOBCONTAINERSASURL",
    "DIAGNOSTICS_AZUREBLOBRETENTIONINDAYS",
    "WEBSITE_HTTPLOGGING_CONTAINER_URL",
    "WEBSITE_HTTPLOGGING_RETENTION_DAYS",
    "WEBSITE_VNET_ROUTE_ALL",
    "spring.datasource.password",
    "spring.datasource.url",
    "spring.datasource.username",
    HEALTH_CHECK_MAX_PING_FAILURES,
];

/// Name/value pairs embedded in the site config on create, sorted by name.
/// `None` when there is nothing to send.
pub fn expand_for_create(settings: &HashMap<String, String>) -> Option<Vec<NameValuePair>> {
    if settings.is_empty() {
        return None;
    }

    let mut pairs: Vec<NameValuePair> = settings
        .iter()
        .map(|(name, value)| NameValuePair {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    pairs.sort_by(|a, b| a.name.cmp(&b.name));
    Some(pairs)
}

/// Body for `PUT config/appsettings`
pub fn expand_for_update(pairs: &[NameValuePair]) -> StringDictionary {
    StringDictionary::new(
        pairs
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect(),
    )
}

/// Sets, replaces or removes a pair, matching names case-insensitively
pub fn update_or_append(
    mut pairs: Vec<NameValuePair>,
    name: &str,
    value: &str,
    remove: bool,
) -> Vec<NameValuePair> {
    if let Some(idx) = pairs.iter().position(|p| p.name.eq_ignore_ascii_case(name)) {
        if remove {
            pairs.remove(idx);
        } else {
            pairs[idx].value = value.to_string();
        }
    } else if !remove {
        pairs.push(NameValuePair {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    pairs
}

/// Overlays user settings on system-generated ones; user values win
pub fn merge_user_app_settings(
    system: Vec<NameValuePair>,
    user: &HashMap<String, String>,
) -> Vec<NameValuePair> {
    let mut keys: Vec<&String> = user.keys().collect();
    keys.sort();
    keys.into_iter()
        .fold(system, |pairs, k| update_or_append(pairs, k, &user[k], false))
}

/// Eviction time in minutes carried by the health check app setting.
/// Unparseable values count as zero.
pub fn health_check_eviction_time(settings: &HashMap<String, String>) -> i64 {
    settings
        .get(HEALTH_CHECK_MAX_PING_FAILURES)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse().unwrap_or(0))
        .unwrap_or(0)
}

/// Drops every setting that is managed through another attribute
pub fn filter_managed(mut settings: HashMap<String, String>) -> HashMap<String, String> {
    for key in MANAGED_APP_SETTINGS {
        settings.remove(*key);
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn create_expansion_is_sorted_and_skips_empty() {
        assert!(expand_for_create(&HashMap::new()).is_none());

        let pairs = expand_for_create(&settings(&[("b", "2"), ("a", "1")])).unwrap();
        assert_eq!(pairs[0].name, "a");
        assert_eq!(pairs[1].name, "b");

        let dict = expand_for_update(&pairs);
        assert_eq!(dict.properties.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn user_settings_override_case_insensitively() {
        let system = vec![NameValuePair {
            name: "FUNCTIONS_WORKER_RUNTIME".to_string(),
            value: "node".to_string(),
        }];
        let merged =
            merge_user_app_settings(system, &settings(&[("functions_worker_runtime", "python")]));

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "python");
    }

    #[test]
    fn update_or_append_removes() {
        let pairs = update_or_append(Vec::new(), "A", "1", false);
        let pairs = update_or_append(pairs, "a", "", true);
        assert!(pairs.is_empty());
    }

    #[test]
    fn managed_settings_are_filtered() {
        let raw = settings(&[
            ("foo", "bar"),
            ("WEBSITE_VNET_ROUTE_ALL", "1"),
            (DOCKER_REGISTRY_SERVER_PASSWORD, "secret"),
            (HEALTH_CHECK_MAX_PING_FAILURES, "5"),
        ]);

        assert_eq!(health_check_eviction_time(&raw), 5);
        assert_eq!(filter_managed(raw), settings(&[("foo", "bar")]));
    }

    #[test]
    fn invalid_eviction_time_is_zero() {
        assert_eq!(
            health_check_eviction_time(&settings(&[(HEALTH_CHECK_MAX_PING_FAILURES, "x")])),
            0
        );
        assert_eq!(health_check_eviction_time(&HashMap::new()), 0);
    }
}
