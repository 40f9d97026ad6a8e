#[macro_export]
macro_rules! die {
    ($($val:expr),+$(,)?) => {{
        $(
            print!("{}", $val);
        )*
        println!();

        std::process::exit(1)
    }}
}
