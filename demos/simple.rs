use tyco_core::analyze;

fn main() {
    let tyco_data = r#"
str app_name: demo

Server:
  *str host:
  int port: 8080
  str url: "http://{host}:{port}/"
  - localhost
  - demo.example.com, port: 443
"#;

    match analyze(tyco_data, "example.tyco") {
        Ok(result) => {
            let json_output = result.to_json().unwrap();
            println!("Successfully parsed Tyco to JSON:\n{json_output}");
        }
        Err(e) => {
            eprintln!("Failed to parse Tyco: {e:?}");
        }
    }
}
