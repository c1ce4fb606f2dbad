#![no_main]

use ferrous_inject::{Arguments, Environment, InjectError, Parameter, Recipe, Signature};
use libfuzzer_sys::fuzz_target;

struct Mailer;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let env = Environment::builder().without_default_providers().build();
    env.register(Recipe::of::<Mailer>().factory(|_| Mailer)).unwrap();

    // First byte shapes the signature, the next six declare parameters and
    // the rest become keyword arguments
    let shape = data[0];
    let mut signature = Signature::new();
    for (i, bits) in data[1..].iter().take(6).enumerate() {
        let name = format!("p{i}");
        let mut param = match bits % 3 {
            0 => Parameter::new(name),
            1 => Parameter::positional_only(name),
            _ => Parameter::keyword_only(name),
        };
        if bits & 0x10 != 0 {
            param = param.typed::<Mailer>();
        }
        if bits & 0x20 != 0 {
            param = param.default_value(0u8);
        }
        signature = signature.param(param);
    }
    if shape & 1 != 0 {
        signature = signature.var_positional();
    }
    if shape & 2 != 0 {
        signature = signature.var_keyword();
    }

    let mut args = Arguments::new();
    for i in 0..(shape >> 2) % 8 {
        args = args.arg(i);
    }
    for (i, bits) in data[1..].iter().enumerate().skip(6).take(6) {
        args = args.kwarg(format!("p{}", bits % 8), i as u8);
    }

    match env.resolve(&signature, args) {
        Ok(bound) => assert!(bound.len() >= signature.params().len()),
        Err(InjectError::MissingArgument(_))
        | Err(InjectError::ExtraPositionalArguments(_))
        | Err(InjectError::ExtraKeywordArguments(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
});
