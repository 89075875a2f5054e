use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sinca_harvester::models::{AveragingPeriod, Region};
use sinca_harvester::readers::{extract_anchor_fields, RegionPageParser};
use sinca_harvester::utils::constants::REGION_LISTING_BASE_URL;
use sinca_harvester::utils::{canonical_filename, sanitize_filename_component};

const CODES: [&str; 5] = ["PM10", "PM25", "0001", "0003", "0008"];

fn series_href(key: &str, code: &str) -> String {
    format!(
        "/cgi-bin/APUB-MMA/apub.htmlindico2.cgi?page=pageRight&amp;header=X&amp;period=specified\
         &amp;from=010100&amp;to=250101&amp;macro=./RVIII/{key}/Cal/{code}//{code}.diario.diario.ic&amp;limgfrom="
    )
}

// Listing page with `stations` rows of five series each
fn create_listing_page(stations: usize) -> String {
    let mut rows = String::new();
    for i in 0..stations {
        let key = format!("station-{}", i);
        rows.push_str(&format!(
            r#"<tr><th><a href="/index.php/estacion/index/id/{i}">Estación {i}</a></th>
               <td><span title="en línea"></span></td>"#
        ));
        for code in CODES {
            rows.push_str(&format!(r#"<td><a href="{}">{}</a></td>"#, series_href(&key, code), code));
        }
        rows.push_str("</tr>");
    }
    format!(
        r#"<html><body><table id="tablaRegional">
           <caption id="tableRows">Estaciones: {stations}</caption>
           <tbody>{rows}</tbody></table></body></html>"#
    )
}

fn benchmark_sanitize(c: &mut Criterion) {
    let names = [
        "Talcahuano",
        "Padre Las Casas II",
        "Quintero: Centro / Sur",
        "  Coyhaique*II?  ",
        "Liceo Ignacio Carrera Pinto <Rancagua>",
    ];

    c.bench_function("sanitize_filename_component", |b| {
        b.iter(|| {
            for name in &names {
                black_box(sanitize_filename_component(black_box(name)));
            }
        })
    });
}

fn benchmark_anchor_extraction(c: &mut Criterion) {
    let href = series_href("talcahuano", "PM25").replace("&amp;", "&");

    c.bench_function("extract_anchor_fields", |b| {
        b.iter(|| black_box(extract_anchor_fields(black_box(&href))))
    });
}

fn benchmark_page_parsing(c: &mut Criterion) {
    let parser = RegionPageParser::new().expect("selectors compile");
    let region = Region::new("VIII", REGION_LISTING_BASE_URL);
    let mut group = c.benchmark_group("region_page_by_size");

    for &size in &[5, 20, 80] {
        let page = create_listing_page(size);
        group.bench_with_input(BenchmarkId::new("stations", size), &page, |b, page| {
            b.iter(|| black_box(parser.parse(&region, page)))
        });
    }

    group.finish();
}

fn benchmark_catalog_flatten(c: &mut Criterion) {
    let parser = RegionPageParser::new().expect("selectors compile");
    let region = Region::new("VIII", REGION_LISTING_BASE_URL);
    let parsed = parser.parse(&region, &create_listing_page(80));

    let mut catalog = sinca_harvester::models::Catalog::new();
    catalog.insert_region(region.code.clone(), parsed.record);

    c.bench_function("catalog_entries_and_names", |b| {
        b.iter(|| {
            for entry in catalog.entries(AveragingPeriod::Annual) {
                black_box(canonical_filename(&entry));
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_sanitize,
    benchmark_anchor_extraction,
    benchmark_page_parsing,
    benchmark_catalog_flatten
);
criterion_main!(benches);
