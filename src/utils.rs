use crate::peer::types::IceServerConfig;
use rand::Rng;

/// Length of a generated channel id
pub const CHANNEL_ID_LEN: usize = 12;

const CHANNEL_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Draws a fresh channel id; uniqueness is the registry's job
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..CHANNEL_ID_LEN)
        .map(|_| CHANNEL_ID_ALPHABET[rng.random_range(0..CHANNEL_ID_ALPHABET.len())] as char)
        .collect()
}

/// Prefixes bare `host:port` ICE URLs with `stun:`
pub fn add_ice_url_scheme(url: &str) -> String {
    let url = url.trim();
    if ["stun:", "stuns:", "turn:", "turns:"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
    {
        url.to_string()
    } else {
        format!("stun:{url}")
    }
}

/// Builds ICE server entries, attaching credentials to TURN urls only
pub fn ice_servers_from_urls(
    urls: &[String],
    username: Option<&str>,
    credential: Option<&str>,
) -> Vec<IceServerConfig> {
    urls.iter()
        .filter(|url| !url.trim().is_empty())
        .map(|url| {
            let mut server = IceServerConfig {
                url: add_ice_url_scheme(url),
                username: username.map(str::to_string),
                credential: credential.map(str::to_string),
            };
            if !server.is_turn() {
                server.username = None;
                server.credential = None;
            }
            server
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_id_uses_fixed_length_alphanumerics() {
        for _ in 0..64 {
            let id = random_id();
            assert_eq!(id.len(), CHANNEL_ID_LEN);
            assert!(id.bytes().all(|b| CHANNEL_ID_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn random_ids_do_not_repeat_in_practice() {
        let ids: HashSet<_> = (0..1000).map(|_| random_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn bare_hosts_get_stun_scheme() {
        assert_eq!(
            add_ice_url_scheme("stun.l.google.com:19302"),
            "stun:stun.l.google.com:19302"
        );
        assert_eq!(add_ice_url_scheme("turn:relay:3478"), "turn:relay:3478");
        assert_eq!(add_ice_url_scheme(" stuns:x:5349 "), "stuns:x:5349");
    }

    #[test]
    fn credentials_only_go_to_turn_servers() {
        let servers = ice_servers_from_urls(
            &["stun.example:3478".into(), "turn:relay.example:3478".into(), " ".into()],
            Some("user"),
            Some("secret"),
        );
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].url, "stun:stun.example:3478");
        assert_eq!(servers[0].username, None);
        assert_eq!(servers[1].username.as_deref(), Some("user"));
        assert_eq!(servers[1].credential.as_deref(), Some("secret"));
    }
}
