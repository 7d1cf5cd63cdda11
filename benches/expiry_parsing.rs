use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};

use editwars::protection::LocaleRegistry;

const LANGUAGES: &[&str] = &["en", "de", "ru", "uk", "ar", "sk", "pl", "cs", "it"];

fn generate_descriptions(language: &str, count: u64) -> Vec<String> {
    // generate inputs from fixed seeds
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(count); /* define specific algorithm to ensure reproducibility */
    (0..count)
        .map(|_| {
            let day = rng.gen_range(1..=28);
            let hour = rng.gen_range(0..24);
            let minute = rng.gen_range(0..60);
            let year = rng.gen_range(2005..2030);
            if rng.gen_ratio(1, 5) {
                return match language {
                    "de" => "[edit=sysop] (unbeschränkt)".to_string(),
                    "ru" => "[edit=sysop] (бессрочно)".to_string(),
                    _ => "[edit=sysop] (indefinite)".to_string(),
                };
            }
            match language {
                "de" => format!("[edit=autoconfirmed] (bis {day}. Mai {year}, {hour:02}:{minute:02} Uhr (UTC))"),
                "ru" => format!("[edit=autoconfirmed] (истекает {hour:02}:{minute:02}, {day} мая {year} (UTC))"),
                "uk" => format!("[edit=autoconfirmed] (закінчується {hour:02}:{minute:02}, {day} травня {year} (UTC))"),
                "ar" => format!("[edit=autoconfirmed] (تنتهي في {hour:02}:{minute:02}، {day} مايو {year} (ت ع م))"),
                "sk" => format!("[edit=autoconfirmed] (vyprší o {hour:02}:{minute:02}, {day}. mája {year} (UTC))"),
                "pl" => format!("[edit=autoconfirmed] (wygasa {hour:02}:{minute:02}, {day} maj {year} (UTC))"),
                "cs" => format!("[edit=autoconfirmed] (vyprší v {day}. 5. {year}, {hour:02}:{minute:02})"),
                "it" => format!("[edit=autoconfirmed] (scade il {day} mag {year} alle {hour:02}:{minute:02} (UTC))"),
                _ => format!("[edit=autoconfirmed] (expires {hour:02}:{minute:02}, {day} May {year} (UTC))"),
            }
        })
        .collect()
}

fn bench_locale_parsers(c: &mut Criterion) {
    let registry = LocaleRegistry::with_defaults();
    let mut group = c.benchmark_group("locale_expiry");
    for language in LANGUAGES {
        let inputs = generate_descriptions(language, 200);
        group.bench_with_input(BenchmarkId::new("parse", language), &inputs, |b, inputs| {
            b.iter(|| {
                inputs
                    .iter()
                    .filter(|text| registry.parse(language, text).is_parsed())
                    .count()
            });
        });
    }
    group.finish();
}

fn bench_registry_construction(c: &mut Criterion) {
    c.bench_function("registry_with_defaults", |b| b.iter(LocaleRegistry::with_defaults));
}

criterion_group!(benches, bench_locale_parsers, bench_registry_construction);
criterion_main!(benches);
