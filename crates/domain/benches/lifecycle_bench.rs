use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Brand, BrandFields, CreateCommand, LifecycleService, RequestContext, StoreRepository,
    SystemClock, UpdateCommand,
};
use entity_store::{InMemoryEntityStore, ListCriteria};

type BrandService = LifecycleService<Brand, StoreRepository<InMemoryEntityStore, Brand>>;

fn service() -> BrandService {
    LifecycleService::new(
        StoreRepository::new(InMemoryEntityStore::new()),
        Arc::new(SystemClock),
    )
}

fn bench_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = RequestContext::system();

    c.bench_function("lifecycle/create", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = service();
                service
                    .create(&ctx, CreateCommand::new("Acme", BrandFields::default()))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = RequestContext::system();
    let service = service();
    let created = rt
        .block_on(service.create(&ctx, CreateCommand::new("Acme", BrandFields::default())))
        .unwrap();
    let id = created.id;
    let mut version = created.version;

    c.bench_function("lifecycle/update", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = UpdateCommand::new(version.as_i64())
                    .rename(format!("Acme {}", version.as_i64()));
                version = service.update(&ctx, id, cmd).await.unwrap().version;
            });
        });
    });
}

fn bench_list(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = RequestContext::system();
    let service = service();
    rt.block_on(async {
        for i in 0..200 {
            let cmd = CreateCommand::new(format!("Brand {i}"), BrandFields::default());
            service.create(&ctx, cmd).await.unwrap();
        }
    });

    c.bench_function("lifecycle/list_page", |b| {
        b.iter(|| {
            rt.block_on(async {
                let criteria = ListCriteria::new().name_contains("brand 1").limit(20);
                service.list(&criteria).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_create, bench_update, bench_list);
criterion_main!(benches);
