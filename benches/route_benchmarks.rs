use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use warmgate::config::{GatewayConfig, RouteConfig};
use warmgate::proxy::ProxyState;

fn create_test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default_config();
    config.routes.push(RouteConfig {
        name: "pagos-admin".to_string(),
        prefix: "/api/pagos/admin".to_string(),
        upstream: "http://pagos-admin:3000".to_string(),
        strip_prefix: true,
        upstream_prefix: None,
    });
    config
}

fn benchmark_route_matching(c: &mut Criterion) {
    let config = create_test_config();

    c.bench_function("route_matching_hit", |b| {
        b.iter(|| {
            for route in &config.routes {
                black_box(route.matches_path(black_box("/api/usuarios/42/perfil")));
            }
        })
    });

    c.bench_function("route_matching_miss", |b| {
        b.iter(|| {
            for route in &config.routes {
                black_box(route.matches_path(black_box("/api/pedidos/42")));
            }
        })
    });
}

fn benchmark_path_transformation(c: &mut Criterion) {
    let config = create_test_config();
    let usuarios = &config.routes[0];
    let pagos = &config.routes[1];

    c.bench_function("path_transformation_replace_prefix", |b| {
        b.iter(|| black_box(usuarios.transform_path(black_box("/api/usuarios/42/perfil"))))
    });

    c.bench_function("path_transformation_strip_prefix", |b| {
        b.iter(|| black_box(pagos.transform_path(black_box("/api/pagos/checkout"))))
    });
}

fn benchmark_resolve(c: &mut Criterion) {
    let state = match ProxyState::new(create_test_config()) {
        Ok(state) => state,
        Err(e) => panic!("failed to build proxy state: {}", e),
    };

    c.bench_function("resolve_longest_prefix", |b| {
        b.iter(|| black_box(state.resolve(black_box("/api/pagos/admin/reembolsos")).is_ok()))
    });

    c.bench_function("resolve_not_found", |b| {
        b.iter(|| black_box(state.resolve(black_box("/desconocido")).is_err()))
    });
}

fn benchmark_config_validation(c: &mut Criterion) {
    let config = create_test_config();

    c.bench_function("config_validation", |b| {
        b.iter(|| black_box(config.validate().is_ok()))
    });
}

criterion_group!(
    benches,
    benchmark_route_matching,
    benchmark_path_transformation,
    benchmark_resolve,
    benchmark_config_validation
);
criterion_main!(benches);
