//! Shared fixtures for integration tests.

use std::cell::RefCell;

use chrono::NaiveDate;
use nginx_config_builder::release::{CheckError, ConfigChecker, ReleaseManager};
use nginx_config_builder::BuildSettings;

/// A document touching every generator.
pub const SHOP_DOCUMENT: &str = r#"
user_vars:
  domain: shop.example.com
  cache_size: 1g
  bots: (googlebot|bingbot)

upstreams:
  - name: api
    servers:
      - addr: 10.0.0.10:9000
        flags:
          max_fails: 3
  - select_default: true
    default_servers_flags:
      - selector: '^172\.17\.0\.3'
        flags:
          backup: ~

maps:
  - variable: is_bot
    string: $http_user_agent
    lines: |
      default 0;
      ~*{{user_vars.bots}} 1;

proxy_caches:
  - name: pages
    in_mem: true
    flags:
      max_size: '{{user_vars.cache_size}}'

in_http_block: |
  client_max_body_size 20m;

vhosts:
  - server_name: '{{user_vars.domain}}'
    variables:
      - name: backend
        value: http://{{upstreams.api}}
    locations:
      - uri: /api/
        body: |
          proxy_cache {{proxy_caches.pages}};
          proxy_pass ${{variables.backend}};
      - uri: /
        body: try_files $uri {{named_locations.app}};
      - named: app
        body: |
          if (${{map_variables.is_bot}}) {
              return 403;
          }
          proxy_pass http://{{upstreams.default}};
      - include: /etc/nginx/snippets/common.conf
  - server_name: static.example.com
    locations:
      - uri: /
        body: 'root /srv/static; # ${{variables.backend}}'
"#;

pub fn settings() -> BuildSettings {
    BuildSettings {
        app_name: "shop".into(),
        listeners: vec!["172.17.0.2:5000".into(), "172.17.0.3:5000".into()],
        upstream_ports: vec![5000],
        ..Default::default()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[allow(dead_code)]
pub fn manager(root: &std::path::Path) -> ReleaseManager {
    ReleaseManager::new(root.join("conf.d")).with_today(today())
}

/// Checker returning a scripted sequence of verdicts.
#[allow(dead_code)]
pub struct ScriptedChecker {
    verdicts: RefCell<Vec<bool>>,
}

#[allow(dead_code)]
impl ScriptedChecker {
    /// `true` accepts, `false` rejects; consumed front to back.
    pub fn new(verdicts: &[bool]) -> Self {
        Self {
            verdicts: RefCell::new(verdicts.iter().rev().copied().collect()),
        }
    }
}

impl ConfigChecker for ScriptedChecker {
    fn check(&self) -> Result<(), CheckError> {
        match self.verdicts.borrow_mut().pop() {
            Some(true) | None => Ok(()),
            Some(false) => Err(CheckError::Rejected {
                command: "nginx -t".into(),
                status: "exit status: 1".into(),
                output: "nginx: [emerg] unknown directive".into(),
            }),
        }
    }
}
