//! Record mapping throughput for one full page of assets

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use iiq_sync_lib::domain::{CustomFieldDefinition, EntityKind, RecordMapper, SchemaDefinition, ValueSanitizer};

fn asset_page(size: usize) -> Vec<Value> {
    (0..size)
        .map(|i| {
            json!({
                "AssetId": format!("00000000-0000-0000-0000-{i:012}"),
                "AssetTag": format!("{i:06}"),
                "SerialNumber": format!("SN{i}"),
                "Model": { "Name": "Latitude 3190", "Manufacturer": { "Name": "Dell" } },
                "Location": { "Name": "High School" },
                "Owner": { "FullName": "Student Name" },
                "PurchasePrice": "289.50",
                "IsDeleted": false,
                "CustomFieldValues": [
                    { "CustomFieldTypeId": "f1", "Value": "Cart 4" },
                    { "CustomFieldTypeId": "f2", "Value": "" },
                    { "CustomFieldTypeId": "fX", "Value": "retired" }
                ]
            })
        })
        .collect()
}

fn bench_record_mapping(c: &mut Criterion) {
    let items = asset_page(1000);
    let sanitizer = ValueSanitizer::new(4000);
    let mapper = RecordMapper::new(EntityKind::Asset, sanitizer);
    let schema = SchemaDefinition::new(
        EntityKind::Asset,
        vec![
            CustomFieldDefinition::new("f1", "Cart"),
            CustomFieldDefinition::new("f2", "PurchaseOrder"),
        ],
    )
    .expect("valid schema");

    c.bench_function("map_asset_page", |b| {
        b.iter(|| {
            for item in &items {
                let _ = black_box(mapper.map(black_box(item)));
            }
        })
    });

    c.bench_function("map_asset_page_with_custom_fields", |b| {
        b.iter(|| {
            for item in &items {
                let _ = black_box(mapper.map(item));
                let _ = black_box(schema.extract(item, &sanitizer));
            }
        })
    });
}

criterion_group!(benches, bench_record_mapping);
criterion_main!(benches);
