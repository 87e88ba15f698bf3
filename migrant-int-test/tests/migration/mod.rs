mod alias_test;
mod directory_test;
