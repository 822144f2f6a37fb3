//! `linuxFxVersion` / `windowsFxVersion` runtime descriptors: `STACK|version`

use super::{trim_url_scheme, ExpandError};

pub const DOCKER: &str = "DOCKER";
pub const DOTNET_CORE: &str = "DOTNETCORE";
pub const DOTNET: &str = "DOTNET";
pub const DOTNET_ISOLATED: &str = "DOTNET-ISOLATED";
pub const GO: &str = "GO";
pub const JAVA: &str = "JAVA";
pub const JBOSS_EAP: &str = "JBOSSEAP";
pub const NODE: &str = "NODE";
pub const PHP: &str = "PHP";
pub const POWERSHELL: &str = "POWERSHELL";
pub const PYTHON: &str = "PYTHON";
pub const RUBY: &str = "RUBY";
pub const TOMCAT: &str = "TOMCAT";

pub const JAVA_SERVERS: &[&str] = &[JAVA, TOMCAT, JBOSS_EAP];

pub fn encode(stack: &str, version: &str) -> String {
    format!("{}|{}", stack, version)
}

/// `STACK|version` into its parts; the version may itself contain `|`
pub fn decode(fx: &str) -> Option<(&str, &str)> {
    fx.split_once('|')
}

/// `DOCKER|host/image:tag`, or `DOCKER|image:tag` without a registry
pub fn encode_docker(image_name: &str, registry_url: &str) -> String {
    let host = trim_url_scheme(registry_url);
    if host.is_empty() {
        encode(DOCKER, image_name)
    } else {
        encode(DOCKER, &format!("{}/{}", host, image_name))
    }
}

/// Image name from a docker descriptor, without the registry host
pub fn decode_docker_image(fx: &str, registry_url: &str) -> String {
    let image = fx.strip_prefix("DOCKER|").unwrap_or(fx);
    let host = trim_url_scheme(registry_url);
    if host.is_empty() {
        return image.to_string();
    }
    image
        .strip_prefix(&format!("{}/", host))
        .unwrap_or(image)
        .to_string()
}

/// Major Java version: `1.8` and `8` are both 8, `11.0.2` is 11
pub fn java_major(version: &str) -> &str {
    let version = version.strip_prefix("1.").unwrap_or(version);
    version.split(|c: char| c == '.' || c == '_' || c == 'u').next().unwrap_or(version)
}

/// Java descriptor for Linux: `SERVER|serverVersion-javaN`.
///
/// Java 8 images are published as `jre8` for Java SE and Tomcat and as
/// `java8` for JBoss EAP. A Java SE version naming an exact update
/// (`8u302`) is used as-is.
pub fn encode_java_linux(
    java_version: &str,
    java_server: &str,
    java_server_version: &str,
) -> Result<String, ExpandError> {
    if !JAVA_SERVERS.contains(&java_server) {
        return Err(ExpandError::new(format!(
            "`java_server` must be one of {}, got {:?}",
            JAVA_SERVERS.join(", "),
            java_server
        )));
    }
    if java_version.is_empty() || java_server_version.is_empty() {
        return Err(ExpandError::new(
            "`java_version` and `java_server_version` must be specified with `java_server`",
        ));
    }

    if java_server == JAVA && java_server_version.contains('u') {
        return Ok(encode(JAVA, java_server_version));
    }

    let major = java_major(java_version);
    let suffix = match (java_server, major) {
        (JBOSS_EAP, "8") => "java8".to_string(),
        (_, "8") => "jre8".to_string(),
        (_, major) => format!("java{}", major),
    };
    Ok(encode(
        java_server,
        &format!("{}-{}", java_server_version, suffix),
    ))
}

/// Inverse of [`encode_java_linux`]: `(java_version, java_server_version)`
pub fn decode_java_linux(version: &str) -> (String, String) {
    match version.split_once('-') {
        Some((server_version, suffix)) => {
            let java = suffix
                .strip_prefix("java")
                .or_else(|| suffix.strip_prefix("jre"))
                .unwrap_or(suffix);
            (java.to_string(), server_version.to_string())
        }
        None => (java_major(version).to_string(), version.to_string()),
    }
}
