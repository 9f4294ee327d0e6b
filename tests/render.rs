//! Compile a full document and inspect every generated fragment.

use std::path::PathBuf;

use nginx_config_builder::pipeline::Compiled;
use nginx_config_builder::template::query;
use nginx_config_builder::Pipeline;

mod common;

fn compile() -> Compiled {
    Pipeline::new(common::settings())
        .compile(common::SHOP_DOCUMENT.as_bytes())
        .unwrap()
}

fn fragment<'a>(compiled: &'a Compiled, path: &str) -> &'a str {
    compiled
        .fragments
        .iter()
        .find(|f| f.path == PathBuf::from(path))
        .map(|f| f.contents.as_str())
        .unwrap_or_else(|| panic!("missing fragment {}", path))
}

#[test]
fn test_fragment_set() {
    let compiled = compile();
    let paths: Vec<_> = compiled.fragments.iter().map(|f| f.path.display().to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "upstreams.conf",
            "maps.conf",
            "proxy_caches.conf",
            "fastcgi_caches.conf",
            "http_block.conf",
            "vhosts/shop.example.com/vhost.conf",
            "vhosts/static.example.com/vhost.conf",
        ]
    );
    assert_eq!(fragment(&compiled, "fastcgi_caches.conf"), "");
    assert_eq!(fragment(&compiled, "http_block.conf"), "client_max_body_size 20m;\n");
}

#[test]
fn test_upstreams() {
    let compiled = compile();
    assert_eq!(
        fragment(&compiled, "upstreams.conf"),
        "upstream shop-default-5000 {\n    server 172.17.0.2:5000;\n    server 172.17.0.3:5000 backup;\n}\n\nupstream shop-api {\n    server 10.0.0.10:9000 max_fails=3;\n}\n"
    );
    assert_eq!(compiled.names.upstreams["default"], "shop-default-5000");
}

#[test]
fn test_maps_and_caches() {
    let compiled = compile();
    assert_eq!(
        fragment(&compiled, "maps.conf"),
        "map $http_user_agent $shop_is_bot {\n    default 0;\n    ~*(googlebot|bingbot) 1;\n}\n"
    );
    assert_eq!(
        fragment(&compiled, "proxy_caches.conf"),
        "proxy_cache_path /dev/shm/nginx/proxy_cache/shop_pages keys_zone=shop_pages:10m inactive=60m levels=1:2 max_size=1g;\n"
    );
}

#[test]
fn test_vhost_scopes() {
    let compiled = compile();
    assert_eq!(
        fragment(&compiled, "vhosts/shop.example.com/vhost.conf"),
        "set $shop_backend http://shop-api;\n\nlocation /api/ {\n    proxy_cache shop_pages;\n    proxy_pass $shop_backend;\n}\n\nlocation / {\n    try_files $uri @app;\n}\n\nlocation @app {\n    if ($shop_is_bot) {\n        return 403;\n    }\n    proxy_pass http://shop-default-5000;\n}\n"
    );
    // `backend` belongs to the first vhost only
    assert_eq!(
        fragment(&compiled, "vhosts/static.example.com/vhost.conf"),
        "location / {\n    root /srv/static; # $\n}\n"
    );
}

#[test]
fn test_resolution_is_a_fixed_point() {
    let compiled = compile();
    let resolved = serde_yaml::to_string(&compiled.document.to_yaml()).unwrap();
    let again = Pipeline::new(common::settings())
        .compile(resolved.as_bytes())
        .unwrap();
    assert_eq!(again.document, compiled.document);
    assert_eq!(again.fragments, compiled.fragments);
}

#[test]
fn test_app_names_do_not_collide() {
    let mut other = common::settings();
    other.app_name = "blog".into();
    let blog = Pipeline::new(other)
        .compile(common::SHOP_DOCUMENT.as_bytes())
        .unwrap();
    assert_eq!(blog.names.upstreams["api"], "blog-api");
    assert_eq!(compile().names.upstreams["api"], "shop-api");
}

#[test]
fn test_query_over_resolved_document() {
    let pipeline = Pipeline::new(common::settings());
    let (_, document) = pipeline.resolve(common::SHOP_DOCUMENT.as_bytes()).unwrap();

    let names = query(&document, "vhosts[*].server_name").unwrap();
    assert_eq!(names, serde_json::json!(["shop.example.com", "static.example.com"]));
    let named = query(&document, "vhosts[0].locations[?named].named").unwrap();
    assert_eq!(named, serde_json::json!(["app"]));
}
