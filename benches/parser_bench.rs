use criterion::{black_box, criterion_group, criterion_main, Criterion};

use metal::{Encoding, Environment, Token, ValueExpression};

const RECORDS: usize = 4096;

fn input() -> Vec<u8> {
    (0..RECORDS)
        .flat_map(|i| [2u8, (i % 251) as u8, 0xff])
        .collect()
}

fn length_prefixed() -> Token {
    let record = Token::seq(
        "",
        vec![
            Token::def("length", ValueExpression::con_int(1)).unwrap(),
            Token::def(
                "data",
                ValueExpression::ref_name_limit("length", ValueExpression::con_int(1)),
            )
            .unwrap(),
        ],
    )
    .unwrap();
    Token::rep("records", record)
}

fn rep_bench(c: &mut Criterion) {
    let grammar = length_prefixed();
    let environment = Environment::from_bytes(input());
    c.bench_function("rep_length_prefixed", |b| {
        b.iter(|| black_box(grammar.parse_environment(&environment, &Encoding::default()).unwrap()))
    });
}

fn cho_bench(c: &mut Criterion) {
    let grammar = Token::rep(
        "",
        Token::cho(
            "",
            vec![
                Token::def_with(
                    "zero",
                    ValueExpression::con_int(1),
                    metal::Expression::eq_num(ValueExpression::con_int(0)),
                )
                .unwrap(),
                Token::def("other", ValueExpression::con_int(1)).unwrap(),
            ],
        )
        .unwrap(),
    );
    let environment = Environment::from_bytes(input());
    c.bench_function("rep_cho_backtracking", |b| {
        b.iter(|| black_box(grammar.parse_environment(&environment, &Encoding::default()).unwrap()))
    });
}

criterion_group! {
    name = parser_benches;
    config = Criterion::default().sample_size(20);
    targets = rep_bench, cho_bench
}

criterion_main!(parser_benches);
