use metal::data::selection::get_values;
use metal::{Encoding, Environment, Expression, MetalResult, Token, ValueExpression};

/// Type-length-value records, terminated by a record of type zero.
fn records() -> MetalResult<Token> {
    let record = Token::seq(
        "record",
        vec![
            Token::def_with(
                "type",
                ValueExpression::con_int(1),
                Expression::not(Expression::eq_num(ValueExpression::con_int(0))),
            )?,
            Token::def("length", ValueExpression::con_int(1))?,
            Token::def(
                "value",
                ValueExpression::ref_name_limit("length", ValueExpression::con_int(1)),
            )?,
        ],
    )?;
    Token::seq(
        "",
        vec![
            Token::rep("records", record),
            Token::def_with(
                "end",
                ValueExpression::con_int(1),
                Expression::eq_num(ValueExpression::con_int(0)),
            )?,
        ],
    )
}

fn main() -> MetalResult<()> {
    let input = Environment::from_bytes(vec![1, 2, 0xca, 0xfe, 7, 1, 0x2a, 0]);
    let Some(parsed) = records()?.parse_environment(&input, &Encoding::default())? else {
        println!("input does not match");
        return Ok(());
    };
    for value in get_values(&parsed.graph, "value", None).reverse().iter() {
        println!("{} = {:?}", value.name(), value.value());
    }
    println!("{:?}", parsed.graph);
    Ok(())
}
