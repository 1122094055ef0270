use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use formbasic::lexer;
use formbasic::parser::parse_handler_code;

const HANDLER: &str = r#"
Dim total As Integer
Dim label As String = "count: "
For i = 1 To 100
    If i Mod 2 = 0 Then
        total = total + i
    ElseIf i Mod 3 = 0 Then
        total = total - 1
    Else
        total = total + 1
    End If
Next
While total > 0
    total = total \ 2
Wend
Label1.Text = label & total
Console.WriteLine("done " & total)
"#;

fn bench_frontend(c: &mut Criterion) {
    let source = HANDLER.repeat(20);

    c.bench_function("tokenize", |b| {
        b.iter(|| lexer::tokenize(black_box(&source)));
    });

    c.bench_function("parse", |b| {
        b.iter(|| parse_handler_code(black_box(&source)).expect("parse failed"));
    });
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
