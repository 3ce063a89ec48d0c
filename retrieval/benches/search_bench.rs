use criterion::{criterion_group, criterion_main, Criterion};
use retrieval::{Engine, EngineConfig, NewDocument, Tokenizer};

fn corpus() -> Vec<NewDocument> {
    (0..1_000)
        .map(|i| NewDocument::new(format!("document {i} about rust search ranking and 检索 引擎 {}", i % 17)))
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let t = Tokenizer::default();
    let text = "我们在北京研究全文检索引擎 with mixed script input and BM25 ranking";
    c.bench_function("tokenize_mixed", |b| b.iter(|| t.tokenize(text)));
}

fn bench_search(c: &mut Criterion) {
    let engine = Engine::new(EngineConfig::default(), Tokenizer::default()).expect("valid config");
    engine.add_documents(corpus()).expect("unique ids");
    c.bench_function("search_1k_docs", |b| b.iter(|| engine.search("rust ranking", Some(10))));
}

criterion_group!(benches, bench_tokenize, bench_search);
criterion_main!(benches);
